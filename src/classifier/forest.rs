//! Random forest decision artifact.
//!
//! The artifact is a JSON export of a fitted binary random forest. Each tree
//! is a flat node array in which node `0` is the root and every split refers
//! to children with a higher index, so traversal always terminates.

use std::{fs, path::Path};

use serde::Deserialize;
use thiserror::Error;

use super::Classifier;
use crate::models::{Features, FEATURE_COUNT};

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("read classifier artifact {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse classifier artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid classifier artifact: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: [f64; 2],
    },
}

#[derive(Debug, Clone, Deserialize)]
struct Tree {
    nodes: Vec<Node>,
}

#[derive(Debug, Deserialize)]
struct ForestArtifact {
    #[serde(default)]
    feature_names: Option<Vec<String>>,
    classes: Vec<i64>,
    trees: Vec<Tree>,
}

/// Validated forest ready for inference.
#[derive(Debug, Clone)]
pub struct RandomForest {
    feature_names: Vec<String>,
    trees: Vec<Vec<ResolvedNode>>,
}

/// Split node, or a leaf holding a normalised class distribution.
#[derive(Debug, Clone, Copy)]
enum ResolvedNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf([f64; 2]),
}

impl RandomForest {
    // ---
    /// Load and validate the artifact at `path`.
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()), err)]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ArtifactError> {
        // ---
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| ArtifactError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let forest = Self::from_slice(&bytes)?;
        tracing::info!(
            trees = forest.tree_count(),
            features = ?forest.feature_names,
            "classifier artifact loaded"
        );
        Ok(forest)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, ArtifactError> {
        // ---
        let artifact: ForestArtifact = serde_json::from_slice(bytes)?;
        Self::validate(artifact)
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn validate(artifact: ForestArtifact) -> Result<Self, ArtifactError> {
        // ---
        let invalid = |msg: String| -> Result<Self, ArtifactError> { Err(ArtifactError::Invalid(msg)) };

        if artifact.classes != [0, 1] {
            return invalid(format!(
                "expected binary classes [0, 1], got {:?}",
                artifact.classes
            ));
        }
        if artifact.trees.is_empty() {
            return invalid("forest has no trees".to_string());
        }

        let feature_names = match artifact.feature_names {
            Some(names) if names.len() != FEATURE_COUNT => {
                return invalid(format!(
                    "expected {} feature names, got {}",
                    FEATURE_COUNT,
                    names.len()
                ));
            }
            Some(names) => names,
            None => vec!["temperature".into(), "humidity".into(), "gas".into()],
        };

        let mut trees = Vec::with_capacity(artifact.trees.len());
        for (t, tree) in artifact.trees.into_iter().enumerate() {
            if tree.nodes.is_empty() {
                return invalid(format!("tree {t} has no nodes"));
            }

            let mut resolved = Vec::with_capacity(tree.nodes.len());
            for (i, node) in tree.nodes.iter().enumerate() {
                let node = match *node {
                    Node::Split {
                        feature,
                        threshold,
                        left,
                        right,
                    } => {
                        if feature >= FEATURE_COUNT {
                            return invalid(format!("tree {t} node {i}: feature {feature} out of range"));
                        }
                        if !threshold.is_finite() {
                            return invalid(format!("tree {t} node {i}: non-finite threshold"));
                        }
                        for child in [left, right] {
                            if child <= i || child >= tree.nodes.len() {
                                return invalid(format!("tree {t} node {i}: bad child index {child}"));
                            }
                        }
                        ResolvedNode::Split {
                            feature,
                            threshold,
                            left,
                            right,
                        }
                    }
                    Node::Leaf { value } => {
                        let total: f64 = value.iter().sum();
                        if value.iter().any(|v| !v.is_finite() || *v < 0.0) || total <= 0.0 {
                            return invalid(format!("tree {t} node {i}: bad leaf weights {value:?}"));
                        }
                        ResolvedNode::Leaf([value[0] / total, value[1] / total])
                    }
                };
                resolved.push(node);
            }
            trees.push(resolved);
        }

        Ok(RandomForest {
            feature_names,
            trees,
        })
    }

    fn leaf(tree: &[ResolvedNode], features: &Features) -> [f64; 2] {
        // ---
        let mut idx = 0;
        loop {
            match tree[idx] {
                ResolvedNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if features[feature] <= threshold { left } else { right };
                }
                ResolvedNode::Leaf(distribution) => return distribution,
            }
        }
    }
}

impl Classifier for RandomForest {
    // ---
    fn predict(&self, features: &Features) -> bool {
        let [p_no_fire, p_fire] = self.predict_probability(features);
        p_fire > p_no_fire
    }

    fn predict_probability(&self, features: &Features) -> [f64; 2] {
        // ---
        let mut sum = [0.0; 2];
        for tree in &self.trees {
            let [p0, p1] = Self::leaf(tree, features);
            sum[0] += p0;
            sum[1] += p1;
        }
        let n = self.trees.len() as f64;
        [sum[0] / n, sum[1] / n]
    }
}
