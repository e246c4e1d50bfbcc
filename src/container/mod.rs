mod array;
mod table;

pub(crate) use array::ArrayContainer;
pub(crate) use table::{member_hash, MemberName, TableContainer};
