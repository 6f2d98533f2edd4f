use super::{HandleKind, HandleRegistry, RawHandle};
use crate::error::{classify, OdbcError, Result};
use crate::native::{is_error, NativeApi, SqlReturn};
use std::sync::Arc;

/// Exclusive owner of one allocated native handle and its registry entry.
///
/// The handle is freed exactly once: by [`OwnedHandle::release`], by
/// [`OwnedHandle::discard`], or on drop. Ownership moves with the guard, so a
/// statement handle travels from the allocating call into the result cursor
/// without any other path holding it.
pub(crate) struct OwnedHandle {
    kind: HandleKind,
    raw: RawHandle,
    api: Arc<dyn NativeApi>,
    registry: Arc<HandleRegistry>,
    counted: bool,
    released: bool,
}

impl OwnedHandle {
    /// Allocates a handle of `kind` under `parent` and records it in the
    /// registry. Allocation failures are classified against the parent's
    /// diagnostics. If accounting fails the native handle is freed again
    /// before the accounting error is returned.
    pub(crate) fn allocate(
        api: &Arc<dyn NativeApi>,
        registry: &Arc<HandleRegistry>,
        kind: HandleKind,
        parent: Option<(HandleKind, RawHandle)>,
    ) -> Result<Self> {
        let parent_raw = parent.map_or(RawHandle::NULL, |(_, raw)| raw);
        let (ret, raw) = api.alloc_handle(kind, parent_raw);
        if is_error(ret) || raw.is_null() {
            return Err(match parent {
                Some((parent_kind, parent_raw)) => {
                    classify(api.as_ref(), "SQLAllocHandle", ret, parent_kind, parent_raw)
                }
                None => OdbcError::from_status("SQLAllocHandle", ret),
            });
        }

        let mut handle = Self {
            kind,
            raw,
            api: Arc::clone(api),
            registry: Arc::clone(registry),
            counted: false,
            released: false,
        };
        registry.increment(kind)?;
        handle.counted = true;

        log::debug!("SQLAllocHandle allocated {} handle {:#x}", kind, raw.addr());
        Ok(handle)
    }

    pub(crate) fn raw(&self) -> RawHandle {
        self.raw
    }

    pub(crate) fn api(&self) -> &dyn NativeApi {
        self.api.as_ref()
    }

    /// Frees the native handle and decrements the registry.
    pub(crate) fn release(mut self) -> Result<()> {
        self.free()
    }

    /// Releases on a path that is already returning another error. A release
    /// failure here is logged, the caller's error wins.
    pub(crate) fn discard(mut self) {
        if let Err(e) = self.free() {
            log::warn!(
                "Dropped release failure for {} handle {:#x}: {}",
                self.kind,
                self.raw.addr(),
                e
            );
        }
    }

    fn free(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let ret = self.api.free_handle(self.kind, self.raw);
        if ret == SqlReturn::INVALID_HANDLE {
            return Err(OdbcError::from_status("SQLFreeHandle", ret));
        }
        if is_error(ret) {
            return Err(classify(
                self.api.as_ref(),
                "SQLFreeHandle",
                ret,
                self.kind,
                self.raw,
            ));
        }
        log::debug!("SQLFreeHandle released {} handle {:#x}", self.kind, self.raw.addr());

        if self.counted {
            self.counted = false;
            self.registry.decrement(self.kind)?;
        }
        Ok(())
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.free() {
            log::warn!(
                "Failed to release {} handle {:#x} on drop: {}",
                self.kind,
                self.raw.addr(),
                e
            );
        }
    }
}
