//! Layout planners. Pure functions from a type (and the type table) to the
//! pointers of its members; no reads happen here.

pub mod abi;
pub mod memory;
pub mod storage;

use evmcodec_core::{DataPointer, Type};

pub use abi::{abi_head_size, allocate_abi_struct, is_dynamic};
pub use memory::allocate_memory_struct;
pub use storage::{
    allocate_contract_storage, allocate_storage_struct, element_range, storage_range_at,
    storage_size, StorageLayout, StorageMember, StorageSize,
};

/// One member of an allocated struct: its name, type and where it lives.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocatedMember {
    pub name: String,
    pub ty: Type,
    pub pointer: DataPointer,
}
