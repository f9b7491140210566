//! Pipeline-tree enumeration (C7): every legal ordering of preprocessing
//! actions a pipeline can apply, constrained by `Tree/*` settings.
//!
//! Stored as an arena (`Vec<TreeNode>`, children/parent as indices) rather
//! than `Box`-linked or `Rc<RefCell<_>>` nodes — creatures reference nodes
//! by index, so an owning, cycle-free arena is the natural representation
//! here (unlike the `Box`-linked [`crate::tree::DecisionTree`], which is
//! never indexed by outside state).

use automl_data::actions::ActionKind;
use automl_data::config::TreeConfig;
use rand::Rng;

const ADDED_LEAF: &str = "addedLeaf";

/// What a tree node represents: a preprocessing action, or the sentinel
/// that ends a branch early ("addedLeaf" in `Tree/pool`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Action(ActionKind),
    AddedLeaf,
}

#[derive(Debug, Clone)]
pub struct TreeNode {
    pub kind: NodeKind,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

/// Arena-backed pipeline tree. Node `0` is always the (action-less) root.
#[derive(Debug, Clone)]
pub struct PipelineTree {
    nodes: Vec<TreeNode>,
}

impl PipelineTree {
    pub const ROOT: usize = 0;

    pub fn node(&self, index: usize) -> &TreeNode {
        &self.nodes[index]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Descend from the root picking a uniformly random child at each
    /// level, stopping at a leaf or at an `addedLeaf` sentinel (the
    /// sentinel itself is elided from the returned path).
    pub fn random_path(&self, rng: &mut impl Rng) -> Vec<usize> {
        let mut path = Vec::new();
        let mut current = Self::ROOT;
        loop {
            let children = &self.nodes[current].children;
            if children.is_empty() {
                break;
            }
            let pick = children[rng.gen_range(0..children.len())];
            if self.nodes[pick].kind == NodeKind::AddedLeaf {
                break;
            }
            path.push(pick);
            current = pick;
        }
        path
    }

    /// `true` iff every consecutive pair in `path` is a direct parent/child
    /// edge in this tree, starting from the root.
    pub fn is_valid_path(&self, path: &[usize]) -> bool {
        let mut current = Self::ROOT;
        for &node in path {
            if !self.nodes[current].children.contains(&node) {
                return false;
            }
            current = node;
        }
        true
    }

    /// The ordered [`ActionKind`]s along `path` (skips nothing — every
    /// node on a valid path is an action since `addedLeaf` is elided by
    /// construction in [`Self::random_path`]).
    pub fn actions_along(&self, path: &[usize]) -> Vec<ActionKind> {
        path.iter()
            .filter_map(|&idx| match self.nodes[idx].kind {
                NodeKind::Action(kind) => Some(kind),
                _ => None,
            })
            .collect()
    }
}

struct Frame {
    pool: Vec<String>,
    depth: usize,
    oversampling_count: usize,
    undersampling_count: usize,
    last_kind: Option<ActionKind>,
}

/// Build the full pipeline tree from `Tree/*` settings: from the root,
/// recursively branch over every pool member plus the `addedLeaf`
/// sentinel, applying (per branch):
/// - FeatureSelection and PCA are mutually exclusive in a branch's
///   descendants once either is chosen,
/// - FeatureSelection, PCA, and IsolationForest are each single-use per
///   branch: once chosen, that action is dropped from the descendant
///   pool unconditionally, regardless of `maxAlgorithmRepetability`,
/// - Oversampling never follows itself directly, and any action is
///   dropped from a branch's pool once it has appeared
///   `maxAlgorithmRepetability` times on that branch,
/// - choosing `addedLeaf` ends the branch.
pub fn build_tree(config: &TreeConfig) -> PipelineTree {
    let mut nodes = vec![TreeNode {
        kind: NodeKind::Root,
        parent: None,
        children: Vec::new(),
    }];
    let root_frame = Frame {
        pool: config.pool.clone(),
        depth: 0,
        oversampling_count: 0,
        undersampling_count: 0,
        last_kind: None,
    };
    build_node(&mut nodes, PipelineTree::ROOT, root_frame, config);
    PipelineTree { nodes }
}

fn build_node(nodes: &mut Vec<TreeNode>, parent: usize, frame: Frame, config: &TreeConfig) {
    if frame.depth >= config.max_tree_depth || frame.pool.is_empty() {
        return;
    }

    let mut items = frame.pool.clone();
    items.push(ADDED_LEAF.to_string());

    for item in items {
        let kind = if item == ADDED_LEAF {
            None
        } else {
            ActionKind::parse(&item)
        };
        let node_kind = match kind {
            Some(k) => NodeKind::Action(k),
            None => NodeKind::AddedLeaf,
        };
        let node_idx = nodes.len();
        nodes.push(TreeNode {
            kind: node_kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        nodes[parent].children.push(node_idx);

        let Some(kind) = kind else {
            continue; // addedLeaf: no descendants
        };

        let mut child_pool = frame.pool.clone();
        let mut oversampling_count = frame.oversampling_count;
        let mut undersampling_count = frame.undersampling_count;

        match kind {
            ActionKind::FeatureSelection => {
                child_pool.retain(|s| s != "PCA" && s != "FeatureSelection");
            }
            ActionKind::Pca => {
                child_pool.retain(|s| s != "FeatureSelection" && s != "PCA");
            }
            ActionKind::Oversampling => {
                oversampling_count += 1;
                if frame.last_kind == Some(ActionKind::Oversampling)
                    || oversampling_count >= config.max_algorithm_repetability
                {
                    child_pool.retain(|s| s != "Oversampling");
                }
            }
            ActionKind::Undersampling => {
                undersampling_count += 1;
                if undersampling_count >= config.max_algorithm_repetability {
                    child_pool.retain(|s| s != "Undersampling");
                }
            }
            ActionKind::IsolationForest => {
                child_pool.retain(|s| s != "IsolationForest");
            }
        }

        let child_frame = Frame {
            pool: child_pool,
            depth: frame.depth + 1,
            oversampling_count,
            undersampling_count,
            last_kind: Some(kind),
        };
        build_node(nodes, node_idx, child_frame, config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fixture_config() -> TreeConfig {
        TreeConfig {
            max_algorithm_repetability: 2,
            max_tree_depth: 3,
            pool: vec![
                "FeatureSelection".into(),
                "PCA".into(),
                "Oversampling".into(),
                "Undersampling".into(),
            ],
        }
    }

    #[test]
    fn root_has_one_child_per_pool_member_plus_sentinel() {
        let tree = build_tree(&fixture_config());
        assert_eq!(tree.node(PipelineTree::ROOT).children.len(), 5);
    }

    #[test]
    fn feature_selection_and_pca_never_coexist_on_a_branch() {
        let tree = build_tree(&fixture_config());
        for &fs_child in &tree.node(PipelineTree::ROOT).children {
            if tree.node(fs_child).kind == NodeKind::Action(ActionKind::FeatureSelection) {
                for &grandchild in &tree.node(fs_child).children {
                    assert_ne!(tree.node(grandchild).kind, NodeKind::Action(ActionKind::Pca));
                }
            }
        }
    }

    #[test]
    fn random_path_is_always_valid() {
        let tree = build_tree(&fixture_config());
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let path = tree.random_path(&mut rng);
            assert!(tree.is_valid_path(&path));
            assert!(path.len() <= fixture_config().max_tree_depth);
        }
    }

    #[test]
    fn feature_selection_pca_and_isolation_forest_are_single_use_per_branch() {
        let config = TreeConfig {
            max_algorithm_repetability: 3,
            max_tree_depth: 4,
            pool: vec!["FeatureSelection".into(), "IsolationForest".into(), "Undersampling".into()],
        };
        let tree = build_tree(&config);
        let mut rng = StdRng::seed_from_u64(13);
        for _ in 0..100 {
            let path = tree.random_path(&mut rng);
            let kinds = tree.actions_along(&path);
            let fs_count = kinds.iter().filter(|&&k| k == ActionKind::FeatureSelection).count();
            let if_count = kinds.iter().filter(|&&k| k == ActionKind::IsolationForest).count();
            assert!(fs_count <= 1, "FeatureSelection repeated on a single branch: {kinds:?}");
            assert!(if_count <= 1, "IsolationForest repeated on a single branch: {kinds:?}");
        }
    }

    #[test]
    fn added_leaf_never_appears_in_a_random_path() {
        let tree = build_tree(&fixture_config());
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let path = tree.random_path(&mut rng);
            for &idx in &path {
                assert_ne!(tree.node(idx).kind, NodeKind::AddedLeaf);
            }
        }
    }
}
