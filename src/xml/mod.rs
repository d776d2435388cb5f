//! XML persistence for the two tables.
//!
//! The document shape is fixed:
//!
//! ```text
//! <school>
//!     <teachers>
//!         <teacher name="…" subject="…" classes="…"/>
//!     </teachers>
//!     <students>
//!         <student name="…" class="…" performance="…"/>
//!     </students>
//! </school>
//! ```
//!
//! Values live only in attributes. The codec works on bytes; reading and
//! writing files is left to the pipeline stages.

mod decode;
mod encode;

pub use decode::{decode, Decoded};
pub use encode::{encode, encode_report_subset};

pub(crate) const ROOT: &str = "school";
pub(crate) const TEACHERS: &str = "teachers";
pub(crate) const TEACHER: &str = "teacher";
pub(crate) const STUDENTS: &str = "students";
pub(crate) const STUDENT: &str = "student";
