/*!
 * Classify Module
 * Source-file extraction from spawn command lines
 */

pub mod classifier;

pub use classifier::Classifier;
