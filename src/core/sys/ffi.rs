// Raw FFI bindings to the system netCDF-C library.
use std::os::raw::{c_char, c_int, c_void};

use super::nc_type;

unsafe extern "C" {
    pub fn nc_inq_libvers() -> *const c_char;
    pub fn nc_strerror(ncerr: c_int) -> *const c_char;

    pub fn nc_create(path: *const c_char, cmode: c_int, ncidp: *mut c_int) -> c_int;
    pub fn nc_open(path: *const c_char, mode: c_int, ncidp: *mut c_int) -> c_int;
    pub fn nc_open_mem(
        path: *const c_char,
        mode: c_int,
        size: usize,
        memory: *mut c_void,
        ncidp: *mut c_int,
    ) -> c_int;
    pub fn nc_close(ncid: c_int) -> c_int;
    pub fn nc_sync(ncid: c_int) -> c_int;
    pub fn nc_redef(ncid: c_int) -> c_int;
    pub fn nc_enddef(ncid: c_int) -> c_int;
    pub fn nc_set_fill(ncid: c_int, fillmode: c_int, old_modep: *mut c_int) -> c_int;

    pub fn nc_inq_natts(ncid: c_int, nattsp: *mut c_int) -> c_int;
    pub fn nc_inq_varids(ncid: c_int, nvars: *mut c_int, varids: *mut c_int) -> c_int;
    pub fn nc_inq_varid(ncid: c_int, name: *const c_char, varidp: *mut c_int) -> c_int;

    pub fn nc_def_grp(parent_ncid: c_int, name: *const c_char, new_ncid: *mut c_int) -> c_int;
    pub fn nc_inq_grpname(ncid: c_int, name: *mut c_char) -> c_int;
    pub fn nc_inq_grps(ncid: c_int, numgrps: *mut c_int, ncids: *mut c_int) -> c_int;
    pub fn nc_inq_grp_ncid(ncid: c_int, grp_name: *const c_char, grp_ncid: *mut c_int) -> c_int;
    pub fn nc_inq_grp_parent(ncid: c_int, parent_ncid: *mut c_int) -> c_int;

    pub fn nc_def_dim(ncid: c_int, name: *const c_char, len: usize, idp: *mut c_int) -> c_int;
    pub fn nc_inq_dim(ncid: c_int, dimid: c_int, name: *mut c_char, lenp: *mut usize) -> c_int;
    pub fn nc_inq_dimlen(ncid: c_int, dimid: c_int, lenp: *mut usize) -> c_int;
    pub fn nc_inq_dimid(ncid: c_int, name: *const c_char, idp: *mut c_int) -> c_int;
    pub fn nc_inq_dimids(
        ncid: c_int,
        ndims: *mut c_int,
        dimids: *mut c_int,
        include_parents: c_int,
    ) -> c_int;
    pub fn nc_inq_unlimdims(ncid: c_int, nunlimdimsp: *mut c_int, unlimdimidsp: *mut c_int)
    -> c_int;

    pub fn nc_def_var(
        ncid: c_int,
        name: *const c_char,
        xtype: nc_type,
        ndims: c_int,
        dimidsp: *const c_int,
        varidp: *mut c_int,
    ) -> c_int;
    pub fn nc_inq_var(
        ncid: c_int,
        varid: c_int,
        name: *mut c_char,
        xtypep: *mut nc_type,
        ndimsp: *mut c_int,
        dimidsp: *mut c_int,
        nattsp: *mut c_int,
    ) -> c_int;
    pub fn nc_inq_varndims(ncid: c_int, varid: c_int, ndimsp: *mut c_int) -> c_int;
    pub fn nc_inq_varnatts(ncid: c_int, varid: c_int, nattsp: *mut c_int) -> c_int;

    pub fn nc_inq_type(ncid: c_int, xtype: nc_type, name: *mut c_char, size: *mut usize) -> c_int;

    pub fn nc_inq_att(
        ncid: c_int,
        varid: c_int,
        name: *const c_char,
        xtypep: *mut nc_type,
        lenp: *mut usize,
    ) -> c_int;
    pub fn nc_inq_attname(ncid: c_int, varid: c_int, attnum: c_int, name: *mut c_char) -> c_int;
    pub fn nc_put_att(
        ncid: c_int,
        varid: c_int,
        name: *const c_char,
        xtype: nc_type,
        len: usize,
        op: *const c_void,
    ) -> c_int;
    pub fn nc_get_att(ncid: c_int, varid: c_int, name: *const c_char, ip: *mut c_void) -> c_int;
    pub fn nc_del_att(ncid: c_int, varid: c_int, name: *const c_char) -> c_int;

    pub fn nc_get_vara(
        ncid: c_int,
        varid: c_int,
        startp: *const usize,
        countp: *const usize,
        ip: *mut c_void,
    ) -> c_int;
    pub fn nc_put_vara(
        ncid: c_int,
        varid: c_int,
        startp: *const usize,
        countp: *const usize,
        op: *const c_void,
    ) -> c_int;
    pub fn nc_get_vars(
        ncid: c_int,
        varid: c_int,
        startp: *const usize,
        countp: *const usize,
        stridep: *const isize,
        ip: *mut c_void,
    ) -> c_int;
    pub fn nc_put_vars(
        ncid: c_int,
        varid: c_int,
        startp: *const usize,
        countp: *const usize,
        stridep: *const isize,
        op: *const c_void,
    ) -> c_int;

    pub fn nc_def_var_deflate(
        ncid: c_int,
        varid: c_int,
        shuffle: c_int,
        deflate: c_int,
        deflate_level: c_int,
    ) -> c_int;
    pub fn nc_inq_var_deflate(
        ncid: c_int,
        varid: c_int,
        shufflep: *mut c_int,
        deflatep: *mut c_int,
        deflate_levelp: *mut c_int,
    ) -> c_int;
    pub fn nc_def_var_chunking(
        ncid: c_int,
        varid: c_int,
        storage: c_int,
        chunksizesp: *const usize,
    ) -> c_int;
    pub fn nc_inq_var_chunking(
        ncid: c_int,
        varid: c_int,
        storagep: *mut c_int,
        chunksizesp: *mut usize,
    ) -> c_int;
    pub fn nc_def_var_fletcher32(ncid: c_int, varid: c_int, fletcher32: c_int) -> c_int;
    pub fn nc_def_var_endian(ncid: c_int, varid: c_int, endian: c_int) -> c_int;
    pub fn nc_def_var_szip(
        ncid: c_int,
        varid: c_int,
        options_mask: c_int,
        pixels_per_block: c_int,
    ) -> c_int;

    pub fn nc_free_string(len: usize, data: *mut *mut c_char) -> c_int;
}
