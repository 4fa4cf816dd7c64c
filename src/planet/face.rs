use nalgebra::{Matrix3, Rotation3};

/// One of the six faces of the cube that is projected onto the planet sphere. Each face looks
/// along one axis, the plane of a face is its local XY plane offset along local +Z.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Face {
    Left,
    Right,
    Top,
    Bottom,
    Front,
    Back,
}

// Signed axis permutations. Every entry is 0 or 1 in magnitude so rotating a point only swaps and
// negates its coordinates, and the edge shared by two faces maps to bit identical points.
lazy_static! {
    static ref ORIENTATION_LEFT: Rotation3<f64> = axes(Matrix3::new(0.0, 0.0, -1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0));
    static ref ORIENTATION_RIGHT: Rotation3<f64> = axes(Matrix3::new(0.0, 0.0, 1.0, 0.0, 1.0, 0.0, -1.0, 0.0, 0.0));
    static ref ORIENTATION_TOP: Rotation3<f64> = axes(Matrix3::new(1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, -1.0, 0.0));
    static ref ORIENTATION_BOTTOM: Rotation3<f64> = axes(Matrix3::new(1.0, 0.0, 0.0, 0.0, 0.0, -1.0, 0.0, 1.0, 0.0));
    static ref ORIENTATION_FRONT: Rotation3<f64> = Rotation3::identity();
    static ref ORIENTATION_BACK: Rotation3<f64> = axes(Matrix3::new(-1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, -1.0));
}

fn axes(matrix: Matrix3<f64>) -> Rotation3<f64> {
    Rotation3::from_matrix_unchecked(matrix)
}

impl Face {
    /// Rotation from the local face frame (plane in XY, facing +Z) to planet space.
    pub fn orientation(self) -> Rotation3<f64> {
        match self {
            Face::Left => *ORIENTATION_LEFT,
            Face::Right => *ORIENTATION_RIGHT,
            Face::Top => *ORIENTATION_TOP,
            Face::Bottom => *ORIENTATION_BOTTOM,
            Face::Front => *ORIENTATION_FRONT,
            Face::Back => *ORIENTATION_BACK,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Face::Left => 0,
            Face::Right => 1,
            Face::Top => 2,
            Face::Bottom => 3,
            Face::Front => 4,
            Face::Back => 5,
        }
    }

    pub fn values() -> impl Iterator<Item = &'static Face> {
        static VALUES: [Face; 6] = [Face::Left, Face::Right, Face::Top, Face::Bottom, Face::Front, Face::Back];
        VALUES.iter()
    }
}
