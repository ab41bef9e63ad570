//! Host device tree through the Windows configuration manager (cfgmgr32).
//!
//! Nodes are devinst handles. The hardware ID property is read with the ANSI
//! registry-property call, so the bytes are the same NUL-separated
//! multi-string [`split_multi_sz`](super::split_multi_sz) decodes.

use std::ptr;

use windows_sys::Win32::Devices::DeviceAndDriverInstallation::{
    CM_Get_Child, CM_Get_DevNode_Registry_PropertyA, CM_Get_Sibling, CM_Locate_DevNodeA,
    CM_DRP_HARDWAREID, CM_LOCATE_DEVNODE_NORMAL, CR_BUFFER_SMALL, CR_SUCCESS,
};

use super::DeviceTreeProvider;

/// The live device tree of the running Windows host.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConfigManager;

impl DeviceTreeProvider for ConfigManager {
    type Node = u32;

    fn locate_root(&self) -> Option<u32> {
        let mut root = 0u32;
        // SAFETY: `root` is a valid out pointer; a null device ID asks for the root.
        let status = unsafe { CM_Locate_DevNodeA(&mut root, ptr::null(), CM_LOCATE_DEVNODE_NORMAL) };
        (status == CR_SUCCESS).then_some(root)
    }

    fn hardware_id_property_len(&self, node: u32) -> Option<usize> {
        let mut len = 0u32;
        // SAFETY: a null buffer with a zero length only queries the size into `len`.
        let status = unsafe {
            CM_Get_DevNode_Registry_PropertyA(
                node,
                CM_DRP_HARDWAREID,
                ptr::null_mut(),
                ptr::null_mut(),
                &mut len,
                0,
            )
        };
        match status {
            CR_SUCCESS | CR_BUFFER_SMALL => Some(len as usize),
            _ => None,
        }
    }

    fn read_hardware_id_property(&self, node: u32, buf: &mut [u8]) -> Option<usize> {
        let mut len = u32::try_from(buf.len()).ok()?;
        // SAFETY: `buf` is writable for `len` bytes and outlives the call.
        let status = unsafe {
            CM_Get_DevNode_Registry_PropertyA(
                node,
                CM_DRP_HARDWAREID,
                ptr::null_mut(),
                buf.as_mut_ptr().cast(),
                &mut len,
                0,
            )
        };
        (status == CR_SUCCESS).then_some(len as usize)
    }

    fn first_child(&self, node: u32) -> Option<u32> {
        let mut child = 0u32;
        // SAFETY: `child` is a valid out pointer.
        let status = unsafe { CM_Get_Child(&mut child, node, 0) };
        (status == CR_SUCCESS).then_some(child)
    }

    fn next_sibling(&self, node: u32) -> Option<u32> {
        let mut sibling = 0u32;
        // SAFETY: `sibling` is a valid out pointer.
        let status = unsafe { CM_Get_Sibling(&mut sibling, node, 0) };
        (status == CR_SUCCESS).then_some(sibling)
    }
}
