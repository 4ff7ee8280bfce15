use std::ffi::{c_char, CStr, CString};
use std::path::Path;

use gdal_sys::CPLErr;

use crate::errors::*;

pub fn _string(raw_ptr: *const c_char) -> Option<String> {
    if raw_ptr.is_null() {
        None
    } else {
        let c_str = unsafe { CStr::from_ptr(raw_ptr) };
        Some(c_str.to_string_lossy().into_owned())
    }
}

pub fn _last_cpl_err(cpl_err_class: CPLErr::Type) -> TilerError {
    let last_err_no = unsafe { gdal_sys::CPLGetLastErrorNo() };
    let last_err_msg = _string(unsafe { gdal_sys::CPLGetLastErrorMsg() }).unwrap_or_default();
    unsafe { gdal_sys::CPLErrorReset() };
    TilerError::CplError {
        class: cpl_err_class,
        number: last_err_no,
        msg: last_err_msg,
    }
}

pub fn _last_null_pointer_err(method_name: &'static str) -> TilerError {
    let last_err_msg = _string(unsafe { gdal_sys::CPLGetLastErrorMsg() }).unwrap_or_default();
    unsafe { gdal_sys::CPLErrorReset() };
    TilerError::NullPointer {
        method_name,
        msg: last_err_msg,
    }
}

pub fn _path_to_c_string(path: &Path) -> Result<CString> {
    let path_str = path.to_string_lossy();
    CString::new(path_str.as_ref()).map_err(Into::into)
}
