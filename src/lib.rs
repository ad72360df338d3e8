//! Workspace root package. Carries the git-hook tooling dev-dependency;
//! all functionality lives in the `crates/` members.
