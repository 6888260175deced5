//! # tollgate-skills
//!
//! Skills are bundles of instructions and resource files that extend what the
//! agent knows how to do. They are not resident: the agent asks for a skill by
//! name, and the [`SkillResolver`] loads it from a [`SkillStore`] the first
//! time and serves it from cache afterwards.
//!
//! ## SKILL.md Format
//!
//! ```markdown
//! ---
//! name: memory
//! description: Use when the user asks to remember or recall something
//! version: 1.0.0
//! tags: [notes]
//! resources: [references/format.md]
//! ---
//!
//! # Memory
//!
//! 1. Read `references/format.md` for the entry layout
//! 2. Append the entry with `fs.write`
//! ```
//!
//! Resource paths are relative to the directory holding SKILL.md and can
//! never resolve outside of it.

pub mod definition;
pub mod resolver;
pub mod store;

pub use definition::{SkillDefinition, SkillSummary};
pub use resolver::{ActiveSkill, SkillResolver, normalize_resource_path};
pub use store::{FsSkillStore, SkillStore};
