//! Model training module
//!
//! Provides the supervised learning stack used by the predictor:
//! - Decision trees and Random Forests
//! - Feature and label encoding
//! - Seeded train/test splitting
//! - Held-out evaluation metrics
//! - The automated predictor that ties them together

pub mod decision_tree;
pub mod random_forest;
mod features;
mod metrics;
mod predictor;
mod split;

pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use features::{FeatureEncoder, FeatureRecipe, LabelEncoder};
pub use metrics::ModelMetrics;
pub use predictor::{AutoMLPredictor, PredictorMetrics, TaskType, TrainedPredictor};
pub use random_forest::{MaxFeatures, RandomForest};
pub use split::TrainTestSplit;
