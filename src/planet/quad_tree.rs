use crate::error::{Error, Result};
use crate::planet::constants::MAX_CHUNK_DEPTH;
use std::fmt;
use std::iter::Iterator;

/// A quadrant of a quad tree node. The index order walks counter-clockwise starting at the
/// bottom-left quadrant of the face plane.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Child {
    BottomLeft,
    BottomRight,
    TopRight,
    TopLeft,
}

impl Child {
    pub fn index(self) -> usize {
        match self {
            Child::BottomLeft => 0,
            Child::BottomRight => 1,
            Child::TopRight => 2,
            Child::TopLeft => 3,
        }
    }

    pub fn from_index(index: u8) -> Result<Child> {
        match index {
            0 => Ok(Child::BottomLeft),
            1 => Ok(Child::BottomRight),
            2 => Ok(Child::TopRight),
            3 => Ok(Child::TopLeft),
            _ => Err(Error::InvalidChildIndex(index)),
        }
    }

    /// Signs of the offset from the parent's center to the center of this quadrant.
    pub fn signs(self) -> (f64, f64) {
        match self {
            Child::BottomLeft => (-1.0, -1.0),
            Child::BottomRight => (1.0, -1.0),
            Child::TopRight => (1.0, 1.0),
            Child::TopLeft => (-1.0, 1.0),
        }
    }

    pub fn values() -> impl Iterator<Item = &'static Child> {
        static DIRECTIONS: [Child; 4] = [
            Child::BottomLeft,
            Child::BottomRight,
            Child::TopRight,
            Child::TopLeft,
        ];
        DIRECTIONS.iter()
    }
}

/// Sequence of quadrants leading from the root of a face to a node. Its length is the depth of
/// the node and never exceeds `MAX_CHUNK_DEPTH`.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct ChunkPath(Vec<Child>);

impl ChunkPath {
    pub fn root() -> ChunkPath {
        ChunkPath(Vec::new())
    }

    /// Builds a path from raw child indices, rejecting anything outside `0..=3`.
    pub fn from_indices(indices: &[u8]) -> Result<ChunkPath> {
        if indices.len() > MAX_CHUNK_DEPTH {
            return Err(Error::DepthOutOfRange { depth: indices.len(), max: MAX_CHUNK_DEPTH });
        }
        indices
            .iter()
            .map(|&index| Child::from_index(index))
            .collect::<Result<Vec<_>>>()
            .map(ChunkPath)
    }

    /// Path of the given quadrant of this node.
    pub fn child(&self, child: Child) -> ChunkPath {
        let mut children = self.0.clone();
        children.push(child);
        ChunkPath(children)
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Child> {
        self.0.iter()
    }
}

impl fmt::Debug for ChunkPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[")?;
        for child in self.0.iter() {
            write!(f, "{}", child.index())?;
        }
        write!(f, "]")
    }
}

/// Handle of a node inside the arena of a chunk tree
pub type NodeId = usize;

/// A node of a face quad tree is either a leaf holding a chunk or a branch with exactly four
/// children, never both.
pub enum QuadTree<T> {
    Leaf(T),
    Branch([NodeId; 4]),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_rejects_invalid_child_index() {
        assert!(ChunkPath::from_indices(&[0, 1, 2, 3]).is_ok());
        match ChunkPath::from_indices(&[0, 4]) {
            Err(Error::InvalidChildIndex(4)) => {}
            other => panic!("unexpected result {:?}", other.map(|p| p.depth())),
        }
    }

    #[test]
    fn path_rejects_excessive_depth() {
        let indices = vec![0u8; MAX_CHUNK_DEPTH + 1];
        assert!(ChunkPath::from_indices(&indices).is_err());
    }

    #[test]
    fn child_extends_path() {
        let path = ChunkPath::root().child(Child::TopRight).child(Child::BottomLeft);
        assert_eq!(path.depth(), 2);
        assert_eq!(format!("{:?}", path), "[20]");
        assert_eq!(path, ChunkPath::from_indices(&[2, 0]).unwrap());
    }

    #[test]
    fn child_indices_round_trip() {
        for child in Child::values() {
            assert_eq!(Child::from_index(child.index() as u8).unwrap(), *child);
        }
    }
}
