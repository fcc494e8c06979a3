//! Turn-order assignment.

use rand::Rng;

use parlor_protocol::SLOT_COUNT;

/// Every ordering of the four slots, in lexicographic order.
///
/// Drawing one row uniformly gives a uniformly random turn order in which
/// no slot is skipped or repeated.
pub const TURN_ORDERS: [[usize; SLOT_COUNT]; 24] = [
    [0, 1, 2, 3],
    [0, 1, 3, 2],
    [0, 2, 1, 3],
    [0, 2, 3, 1],
    [0, 3, 1, 2],
    [0, 3, 2, 1],
    [1, 0, 2, 3],
    [1, 0, 3, 2],
    [1, 2, 0, 3],
    [1, 2, 3, 0],
    [1, 3, 0, 2],
    [1, 3, 2, 0],
    [2, 0, 1, 3],
    [2, 0, 3, 1],
    [2, 1, 0, 3],
    [2, 1, 3, 0],
    [2, 3, 0, 1],
    [2, 3, 1, 0],
    [3, 0, 1, 2],
    [3, 0, 2, 1],
    [3, 1, 0, 2],
    [3, 1, 2, 0],
    [3, 2, 0, 1],
    [3, 2, 1, 0],
];

/// Picks a turn order uniformly at random.
pub fn draw_turn_order<R: Rng + ?Sized>(rng: &mut R) -> [usize; SLOT_COUNT] {
    TURN_ORDERS[rng.random_range(0..TURN_ORDERS.len())]
}
