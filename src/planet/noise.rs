//! Simplex noise in 3D together with its analytic gradient, after Stefan Gustavson's `sdnoise3`.

use nalgebra::Vector3;

const F3: f64 = 1.0 / 3.0;
const G3: f64 = 1.0 / 6.0;

/// Ken Perlin's reference permutation
const PERM: [u8; 256] = [
    151, 160, 137, 91, 90, 15, 131, 13, 201, 95, 96, 53, 194, 233, 7, 225, 140, 36, 103, 30, 69,
    142, 8, 99, 37, 240, 21, 10, 23, 190, 6, 148, 247, 120, 234, 75, 0, 26, 197, 62, 94, 252, 219,
    203, 117, 35, 11, 32, 57, 177, 33, 88, 237, 149, 56, 87, 174, 20, 125, 136, 171, 168, 68, 175,
    74, 165, 71, 134, 139, 48, 27, 166, 77, 146, 158, 231, 83, 111, 229, 122, 60, 211, 133, 230,
    220, 105, 92, 41, 55, 46, 245, 40, 244, 102, 143, 54, 65, 25, 63, 161, 1, 216, 80, 73, 209, 76,
    132, 187, 208, 89, 18, 169, 200, 196, 135, 130, 116, 188, 159, 86, 164, 100, 109, 198, 173,
    186, 3, 64, 52, 217, 226, 250, 124, 123, 5, 202, 38, 147, 118, 126, 255, 82, 85, 212, 207, 206,
    59, 227, 47, 16, 58, 17, 182, 189, 28, 42, 223, 183, 170, 213, 119, 248, 152, 2, 44, 154, 163,
    70, 221, 153, 101, 155, 167, 43, 172, 9, 129, 22, 39, 253, 19, 98, 108, 110, 79, 113, 224, 232,
    178, 185, 112, 104, 218, 246, 97, 228, 251, 34, 242, 193, 238, 210, 144, 12, 191, 179, 162,
    241, 81, 51, 145, 235, 249, 14, 239, 107, 49, 192, 214, 31, 181, 199, 106, 157, 184, 84, 204,
    176, 115, 121, 50, 45, 127, 4, 150, 254, 138, 236, 205, 93, 222, 114, 67, 29, 24, 72, 243, 141,
    128, 195, 78, 66, 215, 61, 156, 180,
];

/// The 12 cube edges, padded to 16 entries so the hash can be masked instead of taken modulo 12
const GRADIENTS: [[f64; 3]; 16] = [
    [1.0, 0.0, 1.0],
    [0.0, 1.0, 1.0],
    [-1.0, 0.0, 1.0],
    [0.0, -1.0, 1.0],
    [1.0, 0.0, -1.0],
    [0.0, 1.0, -1.0],
    [-1.0, 0.0, -1.0],
    [0.0, -1.0, -1.0],
    [1.0, -1.0, 0.0],
    [1.0, 1.0, 0.0],
    [-1.0, 1.0, 0.0],
    [-1.0, -1.0, 0.0],
    [1.0, 0.0, 1.0],
    [-1.0, 0.0, 1.0],
    [0.0, 1.0, -1.0],
    [0.0, -1.0, -1.0],
];

fn perm(index: i64) -> i64 {
    i64::from(PERM[(index & 255) as usize])
}

fn gradient(i: i64, j: i64, k: i64) -> Vector3<f64> {
    let hash = perm(i + perm(j + perm(k)));
    let g = GRADIENTS[(hash & 15) as usize];
    Vector3::new(g[0], g[1], g[2])
}

/// Evaluates simplex noise at `position`. Returns the noise value, roughly in `[-1, 1]`, and its
/// gradient with respect to `position`.
pub fn simplex3(position: &Vector3<f64>) -> (f64, Vector3<f64>) {
    // Skew the input space to find the simplex cell
    let skew = (position.x + position.y + position.z) * F3;
    let i = (position.x + skew).floor();
    let j = (position.y + skew).floor();
    let k = (position.z + skew).floor();

    let unskew = (i + j + k) * G3;
    let d0 = Vector3::new(position.x - (i - unskew), position.y - (j - unskew), position.z - (k - unskew));

    // Offsets of the second and third corners in (i, j, k)
    let (o1, o2): ((i64, i64, i64), (i64, i64, i64)) = if d0.x >= d0.y {
        if d0.y >= d0.z {
            ((1, 0, 0), (1, 1, 0))
        } else if d0.x >= d0.z {
            ((1, 0, 0), (1, 0, 1))
        } else {
            ((0, 0, 1), (1, 0, 1))
        }
    } else if d0.y < d0.z {
        ((0, 0, 1), (0, 1, 1))
    } else if d0.x < d0.z {
        ((0, 1, 0), (0, 1, 1))
    } else {
        ((0, 1, 0), (1, 1, 0))
    };

    let (i, j, k) = (i as i64, j as i64, k as i64);
    let corners = [
        ((0, 0, 0), d0),
        (o1, d0 - Vector3::new(o1.0 as f64, o1.1 as f64, o1.2 as f64) + Vector3::repeat(G3)),
        (o2, d0 - Vector3::new(o2.0 as f64, o2.1 as f64, o2.2 as f64) + Vector3::repeat(2.0 * G3)),
        ((1, 1, 1), d0 - Vector3::repeat(1.0 - 3.0 * G3)),
    ];

    let mut value = 0.0;
    let mut derivative = Vector3::zeros();
    for ((di, dj, dk), d) in corners.iter() {
        let t = 0.6 - d.norm_squared();
        if t <= 0.0 {
            continue;
        }
        let g = gradient(i + di, j + dj, k + dk);
        let g_dot_d = g.dot(d);
        let t2 = t * t;
        let t4 = t2 * t2;
        value += t4 * g_dot_d;
        derivative += d * (-8.0 * t2 * t * g_dot_d) + g * t4;
    }

    (28.0 * value, derivative * 28.0)
}
