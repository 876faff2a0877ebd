pub mod rewriter;

pub use rewriter::{MANIFEST_EXTENSION, RewriteContext, rewrite_manifest};
