/*!
 * Walker Module
 * Descendant discovery, attribution, and peak tracking
 */

pub mod types;
pub mod walker;

pub use types::{Descendant, WalkTotals};
pub use walker::DescendantWalker;
