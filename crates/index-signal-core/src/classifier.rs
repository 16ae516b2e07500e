//! Pre-trained next-candle classifier.
//!
//! The artifact is a random forest exported to JSON in flat node-array form
//! (one set of arrays per tree, leaves marked by `-1` children). It is loaded
//! once, validated, and then only read.

use std::path::Path;

use serde::Deserialize;

use crate::error::SignalError;

/// A trained binary classifier scored one feature row at a time.
pub trait Classifier: Send + Sync {
    /// Feature names in the order `predict` and `predict_proba` expect them.
    fn feature_names(&self) -> &[String];

    /// Class labels, in the order `predict_proba` reports probabilities.
    fn classes(&self) -> &[i64];

    /// Probability for each class in [`Classifier::classes`] order.
    fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>, SignalError>;

    /// Most probable class label.
    fn predict(&self, row: &[f64]) -> Result<i64, SignalError>;
}

#[derive(Debug, Clone, Deserialize)]
struct TreeArtifact {
    children_left: Vec<i64>,
    children_right: Vec<i64>,
    feature: Vec<i64>,
    threshold: Vec<f64>,
    /// Per-node class counts or weights.
    value: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ForestArtifact {
    feature_names: Vec<String>,
    classes: Vec<i64>,
    trees: Vec<TreeArtifact>,
}

#[derive(Debug, Clone)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        distribution: Vec<f64>,
    },
}

#[derive(Debug, Clone)]
struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    fn from_artifact(
        index: usize,
        tree: TreeArtifact,
        n_features: usize,
        n_classes: usize,
    ) -> Result<Self, SignalError> {
        let n = tree.children_left.len();
        if n == 0 {
            return Err(SignalError::Model(format!("tree {index} has no nodes")));
        }
        if tree.children_right.len() != n
            || tree.feature.len() != n
            || tree.threshold.len() != n
            || tree.value.len() != n
        {
            return Err(SignalError::Model(format!(
                "tree {index} node arrays have different lengths"
            )));
        }

        let mut nodes = Vec::with_capacity(n);
        for i in 0..n {
            let (left, right) = (tree.children_left[i], tree.children_right[i]);
            if left < 0 && right < 0 {
                let counts = &tree.value[i];
                if counts.len() != n_classes {
                    return Err(SignalError::Model(format!(
                        "tree {index} leaf {i} has {} class values, expected {n_classes}",
                        counts.len()
                    )));
                }
                let total: f64 = counts.iter().sum();
                if !(total > 0.0) {
                    return Err(SignalError::Model(format!(
                        "tree {index} leaf {i} has no class weight"
                    )));
                }
                nodes.push(Node::Leaf {
                    distribution: counts.iter().map(|c| c / total).collect(),
                });
                continue;
            }

            // Children always come after their parent, which rules out cycles.
            let child = |c: i64| -> Result<usize, SignalError> {
                if c > i as i64 && c < n as i64 {
                    Ok(c as usize)
                } else {
                    Err(SignalError::Model(format!(
                        "tree {index} node {i} has invalid child {c}"
                    )))
                }
            };
            let feature = tree.feature[i];
            if feature < 0 || feature as usize >= n_features {
                return Err(SignalError::Model(format!(
                    "tree {index} node {i} splits on unknown feature {feature}"
                )));
            }
            nodes.push(Node::Split {
                feature: feature as usize,
                threshold: tree.threshold[i],
                left: child(left)?,
                right: child(right)?,
            });
        }

        Ok(Self { nodes })
    }

    /// Features are compared at single precision, as the trees were trained.
    /// A missing value fails the `<=` test and follows the right branch.
    fn leaf(&self, row: &[f64]) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { distribution } => return distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if (row[*feature] as f32) as f64 <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

/// Random forest classifier: probabilities are the mean of the trees' leaf
/// class distributions.
#[derive(Debug, Clone)]
pub struct ForestClassifier {
    feature_names: Vec<String>,
    classes: Vec<i64>,
    trees: Vec<DecisionTree>,
}

impl ForestClassifier {
    /// Load and validate a JSON artifact from disk.
    pub fn load(path: &Path) -> Result<Self, SignalError> {
        let json = std::fs::read_to_string(path)?;
        let model = Self::from_json(&json)
            .map_err(|e| SignalError::Model(format!("{}: {e}", path.display())))?;
        tracing::info!(
            path = %path.display(),
            trees = model.trees.len(),
            features = model.feature_names.len(),
            "loaded classifier"
        );
        Ok(model)
    }

    pub fn from_json(json: &str) -> Result<Self, SignalError> {
        let artifact: ForestArtifact = serde_json::from_str(json)
            .map_err(|e| SignalError::Model(format!("invalid artifact: {e}")))?;

        if artifact.classes.is_empty() {
            return Err(SignalError::Model("artifact declares no classes".into()));
        }
        if artifact.trees.is_empty() {
            return Err(SignalError::Model("artifact has no trees".into()));
        }

        let n_features = artifact.feature_names.len();
        let n_classes = artifact.classes.len();
        let trees = artifact
            .trees
            .into_iter()
            .enumerate()
            .map(|(i, t)| DecisionTree::from_artifact(i, t, n_features, n_classes))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            feature_names: artifact.feature_names,
            classes: artifact.classes,
            trees,
        })
    }

    fn check_row(&self, row: &[f64]) -> Result<(), SignalError> {
        if row.len() != self.feature_names.len() {
            return Err(SignalError::Model(format!(
                "row has {} features, model expects {}",
                row.len(),
                self.feature_names.len()
            )));
        }
        Ok(())
    }
}

impl Classifier for ForestClassifier {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>, SignalError> {
        self.check_row(row)?;
        let mut proba = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            for (p, d) in proba.iter_mut().zip(tree.leaf(row)) {
                *p += d;
            }
        }
        let n = self.trees.len() as f64;
        Ok(proba.into_iter().map(|p| p / n).collect())
    }

    fn predict(&self, row: &[f64]) -> Result<i64, SignalError> {
        let proba = self.predict_proba(row)?;
        let best = proba
            .iter()
            .enumerate()
            .fold(0, |best, (i, p)| if *p > proba[best] { i } else { best });
        Ok(self.classes[best])
    }
}
