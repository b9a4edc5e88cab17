//! # polsat-document: policy documents
//!
//! Reads and writes the XML policy-file format:
//!
//! ```text
//! <policyFile>
//!   <policy>
//!     <rule min="-200" max="200">comparator</rule>
//!     <desc>in degrees Celsius</desc>
//!     <attributes>
//!       <type>temperature</type>
//!       <vendor>Google</vendor>
//!       <time>2006-07-16T23:30:30</time>
//!       <user>user1,user3</user>
//!       <group>groupA,groupC</group>
//!     </attributes>
//!   </policy>
//! </policyFile>
//! ```
//!
//! - [`extract`] turns a document into [`PolicyEntry`] values. Identities are
//!   kept as names; resolving them to ids is the analysis run's job.
//! - [`generate`] produces synthetic conflicted policy files for benchmarking.
//!
//! ## Examples
//!
//! ```
//! use polsat_document::extract_str;
//! use polsat_types::{Bounds, Rule};
//!
//! let xml = r#"<policyFile><policy>
//!     <rule min="0" max="10">comparator</rule>
//!     <attributes><type>temperature</type><vendor>Google</vendor></attributes>
//! </policy></policyFile>"#;
//!
//! let entries = extract_str(xml).unwrap();
//! assert_eq!(entries[0].rule, Rule::Comparator(Bounds::new(0, 10)));
//! ```

mod error;
pub mod extract;
pub mod generate;

pub use error::{DocumentError, GenerateError, Result};
pub use extract::{PolicyEntry, extract_file, extract_str};
pub use generate::{GeneratorOptions, generate_document, policy_file_name, write_policy_files};
