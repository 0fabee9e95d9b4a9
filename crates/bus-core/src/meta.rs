//! A one-byte shared-memory cell carrying an endpoint's assigned id,
//! so a process attaching to a bus key by name (rather than receiving
//! a [`crate::dispatcher::BusData`] handle in-process) can discover
//! the id the dispatcher assigned it.

use shared_memory::ShmemConf;

use crate::error::RingError;

pub struct IdCell {
    shmem: shared_memory::Shmem,
}

unsafe impl Send for IdCell {}
unsafe impl Sync for IdCell {}

impl IdCell {
    pub fn create(os_id: &str, endpoint_id: u8) -> Result<Self, RingError> {
        let shmem = ShmemConf::new()
            .size(1)
            .os_id(os_id)
            .create()
            .map_err(|e| RingError::Backing(e.to_string()))?;
        unsafe {
            *shmem.as_ptr() = endpoint_id;
        }
        Ok(IdCell { shmem })
    }

    pub fn open(os_id: &str) -> Result<Self, RingError> {
        let shmem = ShmemConf::new()
            .os_id(os_id)
            .open()
            .map_err(|e| RingError::Backing(e.to_string()))?;
        Ok(IdCell { shmem })
    }

    pub fn read(&self) -> u8 {
        unsafe { *self.shmem.as_ptr() }
    }
}
