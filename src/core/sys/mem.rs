//! Purpose: In-process reference engine implementing the flat netCDF call set.
//! Exports: `nc_*` functions with the same C calling conventions as the system library.
//! Role: Default backend so the binding layer runs without a system library.
//! Invariants: Status-code returns, out-pointers and engine-allocated strings match netCDF-C.
//! Invariants: Path-backed datasets persist a JSON snapshot on enddef/sync/close; memory datasets never persist.
//! Invariants: ncid = (dataset << 16) | group; dimension ids are dataset-wide, variable ids per group.
//! Notes: The snapshot is a test vehicle, not the netCDF on-disk format.
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::raw::{c_char, c_int, c_void};
use std::path::PathBuf;
use std::ptr;
use std::slice;
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};

use fs2::FileExt;
use serde::{Deserialize, Serialize};

use super::*;

const GROUP_BITS: c_int = 16;
const GROUP_MASK: c_int = 0xffff;
const MAX_DATASETS: c_int = 0x7fff;
const FILL_VALUE_ATT: &str = "_FillValue";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
enum Format {
    NetCdf4,
    Classic,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
enum Values {
    Bytes(Vec<u8>),
    Strings(Vec<String>),
}

impl Values {
    fn empty_for(xtype: nc_type) -> Self {
        if xtype == NC_STRING {
            Values::Strings(Vec::new())
        } else {
            Values::Bytes(Vec::new())
        }
    }

    /// `n` copies of `fill`; `NC_ENOMEM` when the buffer cannot be sized or allocated.
    fn repeat(fill: &Values, n: usize) -> Result<Self, c_int> {
        match fill {
            Values::Bytes(bytes) => {
                let total = bytes.len().checked_mul(n).ok_or(NC_ENOMEM)?;
                let mut out = Vec::new();
                out.try_reserve_exact(total).map_err(|_| NC_ENOMEM)?;
                for _ in 0..n {
                    out.extend_from_slice(bytes);
                }
                Ok(Values::Bytes(out))
            }
            Values::Strings(strings) => {
                let text = strings.first().cloned().unwrap_or_default();
                let mut out = Vec::new();
                out.try_reserve_exact(n).map_err(|_| NC_ENOMEM)?;
                out.resize(n, text);
                Ok(Values::Strings(out))
            }
        }
    }

    fn elements(&self, size: usize) -> usize {
        match self {
            Values::Bytes(bytes) => bytes.len() / size.max(1),
            Values::Strings(strings) => strings.len(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Att {
    name: String,
    xtype: nc_type,
    len: usize,
    values: Values,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Dim {
    name: String,
    len: usize,
    unlimited: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct StorageSettings {
    shuffle: bool,
    deflate: bool,
    deflate_level: c_int,
    contiguous: bool,
    chunks: Vec<usize>,
    fletcher32: bool,
    endian: c_int,
    szip: Option<(c_int, c_int)>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Var {
    name: String,
    xtype: nc_type,
    dimids: Vec<c_int>,
    atts: Vec<Att>,
    storage: StorageSettings,
    /// Shape of the materialized data; grows on write, never shrinks.
    extent: Vec<usize>,
    values: Values,
    #[serde(skip)]
    committed: bool,
}

impl Var {
    fn fill(&self) -> Values {
        self.atts
            .iter()
            .find(|att| att.name == FILL_VALUE_ATT && att.xtype == self.xtype && att.len == 1)
            .map(|att| att.values.clone())
            .unwrap_or_else(|| default_fill(self.xtype))
    }

    fn stored(&self) -> usize {
        self.values.elements(type_size(self.xtype).unwrap_or(1))
    }

    fn offset(&self, pos: &[usize]) -> Option<usize> {
        let offset = row_major(&self.extent, pos)?;
        (offset < self.stored()).then_some(offset)
    }

    fn resize(&mut self, extent: Vec<usize>, fill: &Values) -> Result<(), c_int> {
        let wanted = checked_product(&extent).ok_or(NC_ENOMEM)?;
        if extent == self.extent && self.stored() == wanted {
            return Ok(());
        }
        let size = type_size(self.xtype).unwrap_or(1);
        let mut values = Values::repeat(fill, wanted)?;
        if self.stored() > 0 {
            let zeros = vec![0; self.extent.len()];
            let ones = vec![1; self.extent.len()];
            let mut index = 0;
            for_each_position(&zeros, &self.extent, &ones, |pos| {
                if let Some(target) = row_major(&extent, pos) {
                    match (&mut values, &mut self.values) {
                        (Values::Bytes(new), Values::Bytes(old)) => new
                            [target * size..(target + 1) * size]
                            .copy_from_slice(&old[index * size..(index + 1) * size]),
                        (Values::Strings(new), Values::Strings(old)) => {
                            new[target] = std::mem::take(&mut old[index])
                        }
                        _ => {}
                    }
                }
                index += 1;
            });
        }
        self.extent = extent;
        self.values = values;
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct GroupNode {
    name: String,
    parent: Option<usize>,
    children: Vec<usize>,
    dimids: Vec<c_int>,
    vars: Vec<Var>,
    atts: Vec<Att>,
}

impl GroupNode {
    fn new(name: String, parent: Option<usize>) -> Self {
        Self {
            name,
            parent,
            children: Vec::new(),
            dimids: Vec::new(),
            vars: Vec::new(),
            atts: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Image {
    format: Format,
    groups: Vec<GroupNode>,
    dims: Vec<Dim>,
}

struct Dataset {
    image: Image,
    path: Option<PathBuf>,
    writable: bool,
    define_mode: bool,
    fill_mode: c_int,
}

impl Dataset {
    fn require_writable(&self) -> Result<(), c_int> {
        if self.writable { Ok(()) } else { Err(NC_EPERM) }
    }

    fn is_classic(&self) -> bool {
        self.image.format == Format::Classic
    }

    /// Schema changes: netCDF-4 switches modes on its own, classic datasets do not.
    fn enter_define(&mut self) -> Result<(), c_int> {
        self.require_writable()?;
        if self.define_mode {
            return Ok(());
        }
        if self.is_classic() {
            return Err(NC_ENOTINDEFINE);
        }
        self.define_mode = true;
        Ok(())
    }

    fn enter_data(&mut self) -> Result<(), c_int> {
        if !self.define_mode {
            return Ok(());
        }
        if self.is_classic() {
            return Err(NC_EINDEFINE);
        }
        self.end_define()
    }

    fn end_define(&mut self) -> Result<(), c_int> {
        self.define_mode = false;
        for group in &mut self.image.groups {
            for var in &mut group.vars {
                var.committed = true;
            }
        }
        self.persist()
    }

    fn persist(&self) -> Result<(), c_int> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if !self.writable {
            return Ok(());
        }
        let bytes = serde_json::to_vec(&self.image).map_err(|_| NC_EHDFERR)?;
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(io_status)?;
        file.lock_exclusive().map_err(io_status)?;
        let written = file
            .set_len(0)
            .and_then(|_| file.write_all(&bytes))
            .and_then(|_| file.flush());
        let _ = FileExt::unlock(&file);
        written.map_err(io_status)
    }

    fn group(&self, grp: usize) -> &GroupNode {
        &self.image.groups[grp]
    }

    fn group_mut(&mut self, grp: usize) -> &mut GroupNode {
        &mut self.image.groups[grp]
    }

    fn var(&self, grp: usize, varid: c_int) -> Result<&Var, c_int> {
        usize::try_from(varid)
            .ok()
            .and_then(|index| self.group(grp).vars.get(index))
            .ok_or(NC_ENOTVAR)
    }

    fn var_mut(&mut self, grp: usize, varid: c_int) -> Result<&mut Var, c_int> {
        usize::try_from(varid)
            .ok()
            .and_then(|index| self.image.groups[grp].vars.get_mut(index))
            .ok_or(NC_ENOTVAR)
    }

    fn atts(&self, grp: usize, varid: c_int) -> Result<&Vec<Att>, c_int> {
        if varid == NC_GLOBAL {
            Ok(&self.group(grp).atts)
        } else {
            Ok(&self.var(grp, varid)?.atts)
        }
    }

    fn atts_mut(&mut self, grp: usize, varid: c_int) -> Result<&mut Vec<Att>, c_int> {
        if varid == NC_GLOBAL {
            Ok(&mut self.group_mut(grp).atts)
        } else {
            Ok(&mut self.var_mut(grp, varid)?.atts)
        }
    }

    fn ancestry(&self, grp: usize) -> Vec<usize> {
        let mut chain = vec![grp];
        let mut current = self.group(grp).parent;
        while let Some(parent) = current {
            chain.push(parent);
            current = self.group(parent).parent;
        }
        chain
    }

    fn visible_dimids(&self, grp: usize) -> Vec<c_int> {
        self.ancestry(grp)
            .into_iter()
            .flat_map(|g| self.group(g).dimids.iter().copied())
            .collect()
    }

    fn dim(&self, grp: usize, dimid: c_int) -> Result<&Dim, c_int> {
        if !self.visible_dimids(grp).contains(&dimid) {
            return Err(NC_EBADDIM);
        }
        usize::try_from(dimid)
            .ok()
            .and_then(|index| self.image.dims.get(index))
            .ok_or(NC_EBADDIM)
    }

    fn dim_lens(&self, var: &Var) -> Vec<usize> {
        var.dimids
            .iter()
            .map(|&dimid| self.image.dims[dimid as usize].len)
            .collect()
    }

    fn name_taken_by_var_or_group(&self, grp: usize, name: &str) -> bool {
        let group = self.group(grp);
        group.vars.iter().any(|var| var.name == name)
            || group
                .children
                .iter()
                .any(|&child| self.group(child).name == name)
    }
}

struct Engine {
    datasets: HashMap<c_int, Dataset>,
    next: c_int,
}

impl Engine {
    fn register(&mut self, dataset: Dataset) -> Result<c_int, c_int> {
        if self.datasets.len() >= MAX_DATASETS as usize {
            return Err(NC_ENFILE);
        }
        let mut ext = self.next;
        while self.datasets.contains_key(&ext) {
            ext = if ext >= MAX_DATASETS { 1 } else { ext + 1 };
        }
        self.next = if ext >= MAX_DATASETS { 1 } else { ext + 1 };
        self.datasets.insert(ext, dataset);
        Ok(ext << GROUP_BITS)
    }

    fn locate(&mut self, ncid: c_int) -> Result<(&mut Dataset, usize), c_int> {
        let ext = ncid >> GROUP_BITS;
        let grp = (ncid & GROUP_MASK) as usize;
        let dataset = self.datasets.get_mut(&ext).ok_or(NC_EBADID)?;
        if grp >= dataset.image.groups.len() {
            return Err(NC_EBADID);
        }
        Ok((dataset, grp))
    }
}

static ENGINE: LazyLock<Mutex<Engine>> = LazyLock::new(|| {
    Mutex::new(Engine {
        datasets: HashMap::new(),
        next: 1,
    })
});

fn engine() -> MutexGuard<'static, Engine> {
    ENGINE.lock().unwrap_or_else(PoisonError::into_inner)
}

fn with_group<T>(
    ncid: c_int,
    f: impl FnOnce(&mut Dataset, usize) -> Result<T, c_int>,
) -> Result<T, c_int> {
    let mut engine = engine();
    let (dataset, grp) = engine.locate(ncid)?;
    f(dataset, grp)
}

fn status(result: Result<(), c_int>) -> c_int {
    match result {
        Ok(()) => NC_NOERR,
        Err(code) => code,
    }
}

fn io_status(err: io::Error) -> c_int {
    match err.kind() {
        io::ErrorKind::NotFound => libc::ENOENT,
        io::ErrorKind::PermissionDenied => NC_EPERM,
        io::ErrorKind::OutOfMemory => NC_ENOMEM,
        _ => err.raw_os_error().unwrap_or(NC_EHDFERR),
    }
}

fn type_size(xtype: nc_type) -> Option<usize> {
    match xtype {
        NC_BYTE | NC_CHAR | NC_UBYTE => Some(1),
        NC_SHORT | NC_USHORT => Some(2),
        NC_INT | NC_FLOAT | NC_UINT => Some(4),
        NC_DOUBLE | NC_INT64 | NC_UINT64 => Some(8),
        NC_STRING => Some(std::mem::size_of::<*mut c_char>()),
        _ => None,
    }
}

fn type_name(xtype: nc_type) -> Option<&'static str> {
    match xtype {
        NC_BYTE => Some("byte"),
        NC_CHAR => Some("char"),
        NC_SHORT => Some("short"),
        NC_INT => Some("int"),
        NC_FLOAT => Some("float"),
        NC_DOUBLE => Some("double"),
        NC_UBYTE => Some("ubyte"),
        NC_USHORT => Some("ushort"),
        NC_UINT => Some("uint"),
        NC_INT64 => Some("int64"),
        NC_UINT64 => Some("uint64"),
        NC_STRING => Some("string"),
        _ => None,
    }
}

fn default_fill(xtype: nc_type) -> Values {
    let bytes = match xtype {
        NC_BYTE => (-127i8).to_ne_bytes().to_vec(),
        NC_CHAR => vec![0],
        NC_SHORT => (-32767i16).to_ne_bytes().to_vec(),
        NC_INT => (-2147483647i32).to_ne_bytes().to_vec(),
        NC_FLOAT => 9.969_209_968_386_869e36_f32.to_ne_bytes().to_vec(),
        NC_DOUBLE => 9.969_209_968_386_869e36_f64.to_ne_bytes().to_vec(),
        NC_UBYTE => 255u8.to_ne_bytes().to_vec(),
        NC_USHORT => 65535u16.to_ne_bytes().to_vec(),
        NC_UINT => 4_294_967_295u32.to_ne_bytes().to_vec(),
        NC_INT64 => (-9_223_372_036_854_775_806i64).to_ne_bytes().to_vec(),
        NC_UINT64 => 18_446_744_073_709_551_614u64.to_ne_bytes().to_vec(),
        NC_STRING => return Values::Strings(vec![String::new()]),
        _ => Vec::new(),
    };
    Values::Bytes(bytes)
}

fn check_type(dataset: &Dataset, xtype: nc_type) -> Result<usize, c_int> {
    let size = type_size(xtype).ok_or(NC_EBADTYPE)?;
    if dataset.is_classic() && xtype > NC_DOUBLE {
        return Err(NC_ESTRICTNC3);
    }
    Ok(size)
}

fn validate_name(name: &str) -> Result<(), c_int> {
    if name.len() > NC_MAX_NAME {
        return Err(NC_EMAXNAME);
    }
    let leading_ok = name
        .chars()
        .next()
        .is_some_and(|c| c.is_alphanumeric() || c == '_');
    if !leading_ok || name.contains('/') || name.ends_with(' ') || name.chars().any(char::is_control)
    {
        return Err(NC_EBADNAME);
    }
    Ok(())
}

unsafe fn read_str(name: *const c_char) -> Result<String, c_int> {
    if name.is_null() {
        return Err(NC_EINVAL);
    }
    let name = unsafe { CStr::from_ptr(name) };
    name.to_str().map(str::to_owned).map_err(|_| NC_EBADNAME)
}

unsafe fn write_name(dst: *mut c_char, name: &str) {
    if dst.is_null() {
        return;
    }
    let bytes = &name.as_bytes()[..name.len().min(NC_MAX_NAME)];
    unsafe {
        ptr::copy_nonoverlapping(bytes.as_ptr() as *const c_char, dst, bytes.len());
        *dst.add(bytes.len()) = 0;
    }
}

unsafe fn write_out<T>(dst: *mut T, value: T) {
    if !dst.is_null() {
        unsafe { *dst = value };
    }
}

unsafe fn write_list(dst: *mut c_int, values: &[c_int]) {
    if !dst.is_null() {
        unsafe { ptr::copy_nonoverlapping(values.as_ptr(), dst, values.len()) };
    }
}

fn checked_product(values: &[usize]) -> Option<usize> {
    values.iter().try_fold(1usize, |acc, &value| acc.checked_mul(value))
}

fn row_major(shape: &[usize], pos: &[usize]) -> Option<usize> {
    let mut offset = 0usize;
    for (&len, &index) in shape.iter().zip(pos) {
        if index >= len {
            return None;
        }
        offset = offset * len + index;
    }
    Some(offset)
}

/// Visit every position of a hyperslab selection in row-major order.
fn for_each_position(start: &[usize], count: &[usize], stride: &[usize], mut f: impl FnMut(&[usize])) {
    if count.contains(&0) {
        return;
    }
    let ndims = start.len();
    let mut index = vec![0usize; ndims];
    let mut pos = start.to_vec();
    loop {
        f(&pos);
        let mut d = ndims;
        loop {
            if d == 0 {
                return;
            }
            d -= 1;
            index[d] += 1;
            if index[d] < count[d] {
                pos[d] = start[d] + index[d] * stride[d];
                break;
            }
            index[d] = 0;
            pos[d] = start[d];
        }
    }
}

struct Selection {
    start: Vec<usize>,
    count: Vec<usize>,
    stride: Vec<usize>,
}

impl Selection {
    unsafe fn from_raw(
        ndims: usize,
        startp: *const usize,
        countp: *const usize,
        stridep: *const isize,
    ) -> Result<Self, c_int> {
        if ndims == 0 {
            return Ok(Self {
                start: Vec::new(),
                count: Vec::new(),
                stride: Vec::new(),
            });
        }
        if startp.is_null() || countp.is_null() {
            return Err(NC_EINVALCOORDS);
        }
        let start = unsafe { slice::from_raw_parts(startp, ndims) }.to_vec();
        let count = unsafe { slice::from_raw_parts(countp, ndims) }.to_vec();
        let stride = if stridep.is_null() {
            vec![1; ndims]
        } else {
            unsafe { slice::from_raw_parts(stridep, ndims) }
                .iter()
                .map(|&s| usize::try_from(s).ok().filter(|&s| s > 0).ok_or(NC_ESTRIDE))
                .collect::<Result<Vec<_>, _>>()?
        };
        Ok(Self {
            start,
            count,
            stride,
        })
    }

    /// `NC_EEDGE` when the selection cannot be counted in a `usize`.
    fn elements(&self) -> Result<usize, c_int> {
        checked_product(&self.count).ok_or(NC_EEDGE)
    }

    /// One past the last touched index per dimension (0 where nothing is touched).
    fn reach(&self) -> Vec<usize> {
        (0..self.start.len())
            .map(|d| match self.count[d] {
                0 => 0,
                c => self.start[d]
                    .saturating_add((c - 1).saturating_mul(self.stride[d]))
                    .saturating_add(1),
            })
            .collect()
    }

    fn check(&self, lens: &[usize], growable: &[bool]) -> Result<(), c_int> {
        let reach = self.reach();
        for d in 0..lens.len() {
            if growable[d] {
                continue;
            }
            if self.start[d] > lens[d] {
                return Err(NC_EINVALCOORDS);
            }
            if reach[d] > lens[d] {
                return Err(NC_EEDGE);
            }
        }
        Ok(())
    }
}

fn read_selection(
    dataset: &mut Dataset,
    grp: usize,
    varid: c_int,
    selection: &Selection,
    ip: *mut c_void,
) -> Result<(), c_int> {
    dataset.enter_data()?;
    let var = dataset.var(grp, varid)?;
    let lens = dataset.dim_lens(var);
    selection.check(&lens, &vec![false; lens.len()])?;

    let n = selection.elements()?;
    if n == 0 {
        return Ok(());
    }
    if ip.is_null() {
        return Err(NC_EINVAL);
    }

    let fill = var.fill();
    let mut index = 0usize;
    match (&var.values, &fill) {
        (Values::Bytes(data), Values::Bytes(fill)) => {
            let size = fill.len();
            let bytes = n.checked_mul(size).ok_or(NC_EEDGE)?;
            let out = unsafe { slice::from_raw_parts_mut(ip as *mut u8, bytes) };
            for_each_position(&selection.start, &selection.count, &selection.stride, |pos| {
                let src = match var.offset(pos) {
                    Some(offset) => &data[offset * size..(offset + 1) * size],
                    None => fill.as_slice(),
                };
                out[index * size..(index + 1) * size].copy_from_slice(src);
                index += 1;
            });
        }
        (Values::Strings(data), Values::Strings(fill)) => {
            let out = unsafe { slice::from_raw_parts_mut(ip as *mut *mut c_char, n) };
            let fill = fill.first().map(String::as_str).unwrap_or_default();
            for_each_position(&selection.start, &selection.count, &selection.stride, |pos| {
                let text = var.offset(pos).map(|offset| data[offset].as_str()).unwrap_or(fill);
                out[index] = CString::new(text).unwrap_or_default().into_raw();
                index += 1;
            });
        }
        _ => return Err(NC_EHDFERR),
    }
    Ok(())
}

fn write_selection(
    dataset: &mut Dataset,
    grp: usize,
    varid: c_int,
    selection: &Selection,
    op: *const c_void,
) -> Result<(), c_int> {
    dataset.require_writable()?;
    dataset.enter_data()?;
    let var = dataset.var(grp, varid)?;
    let lens = dataset.dim_lens(var);
    let growable: Vec<bool> = var
        .dimids
        .iter()
        .map(|&dimid| dataset.image.dims[dimid as usize].unlimited)
        .collect();
    selection.check(&lens, &growable)?;

    let n = selection.elements()?;
    if n == 0 {
        return Ok(());
    }
    if op.is_null() {
        return Err(NC_EINVAL);
    }

    let reach = selection.reach();
    let dimids = var.dimids.clone();
    let fill = var.fill();
    let var = dataset.var_mut(grp, varid)?;
    let extent: Vec<usize> = var
        .extent
        .iter()
        .zip(&reach)
        .map(|(&have, &need)| have.max(need))
        .collect();
    var.resize(extent, &fill)?;

    let extent = var.extent.clone();
    let mut index = 0usize;
    match &mut var.values {
        Values::Bytes(data) => {
            let size = type_size(var.xtype).ok_or(NC_EBADTYPE)?;
            let bytes = n.checked_mul(size).ok_or(NC_EEDGE)?;
            let src = unsafe { slice::from_raw_parts(op as *const u8, bytes) };
            for_each_position(&selection.start, &selection.count, &selection.stride, |pos| {
                if let Some(offset) = row_major(&extent, pos) {
                    data[offset * size..(offset + 1) * size]
                        .copy_from_slice(&src[index * size..(index + 1) * size]);
                }
                index += 1;
            });
        }
        Values::Strings(data) => {
            let src = unsafe { slice::from_raw_parts(op as *const *const c_char, n) };
            for_each_position(&selection.start, &selection.count, &selection.stride, |pos| {
                if let Some(offset) = row_major(&extent, pos) {
                    data[offset] = if src[index].is_null() {
                        String::new()
                    } else {
                        unsafe { CStr::from_ptr(src[index]) }
                            .to_string_lossy()
                            .into_owned()
                    };
                }
                index += 1;
            });
        }
    }
    var.committed = true;

    for (dimid, need) in dimids.into_iter().zip(reach) {
        let dim = &mut dataset.image.dims[dimid as usize];
        if dim.unlimited && need > dim.len {
            dim.len = need;
        }
    }
    Ok(())
}

unsafe fn values_from_raw(xtype: nc_type, len: usize, op: *const c_void) -> Result<Values, c_int> {
    if len == 0 {
        return Ok(Values::empty_for(xtype));
    }
    if op.is_null() {
        return Err(NC_EINVAL);
    }
    if xtype == NC_STRING {
        let src = unsafe { slice::from_raw_parts(op as *const *const c_char, len) };
        let strings = src
            .iter()
            .map(|&ptr| {
                if ptr.is_null() {
                    String::new()
                } else {
                    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
                }
            })
            .collect();
        return Ok(Values::Strings(strings));
    }
    let size = type_size(xtype).ok_or(NC_EBADTYPE)?;
    let total = len.checked_mul(size).ok_or(NC_EINVAL)?;
    let bytes = unsafe { slice::from_raw_parts(op as *const u8, total) };
    Ok(Values::Bytes(bytes.to_vec()))
}

unsafe fn values_to_raw(values: &Values, ip: *mut c_void) -> Result<(), c_int> {
    match values {
        Values::Bytes(bytes) => {
            if bytes.is_empty() {
                return Ok(());
            }
            if ip.is_null() {
                return Err(NC_EINVAL);
            }
            unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), ip as *mut u8, bytes.len()) };
        }
        Values::Strings(strings) => {
            if strings.is_empty() {
                return Ok(());
            }
            if ip.is_null() {
                return Err(NC_EINVAL);
            }
            let out = unsafe { slice::from_raw_parts_mut(ip as *mut *mut c_char, strings.len()) };
            for (slot, text) in out.iter_mut().zip(strings) {
                *slot = CString::new(text.as_str()).unwrap_or_default().into_raw();
            }
        }
    }
    Ok(())
}

fn load_image(bytes: &[u8]) -> Result<Image, c_int> {
    let mut image: Image = serde_json::from_slice(bytes).map_err(|_| NC_ENOTNC)?;
    if image.groups.is_empty() {
        return Err(NC_ENOTNC);
    }
    for group in &mut image.groups {
        for var in &mut group.vars {
            var.committed = true;
        }
    }
    Ok(image)
}

fn read_file(path: &PathBuf) -> Result<Vec<u8>, c_int> {
    let mut file = File::open(path).map_err(io_status)?;
    file.lock_shared().map_err(io_status)?;
    let mut bytes = Vec::new();
    let read = file.read_to_end(&mut bytes);
    let _ = FileExt::unlock(&file);
    read.map_err(io_status)?;
    Ok(bytes)
}

pub unsafe fn nc_inq_libvers() -> *const c_char {
    c"4.9.2 (ncfile reference engine)".as_ptr()
}

pub unsafe fn nc_strerror(ncerr: c_int) -> *const c_char {
    let message: &'static CStr = match ncerr {
        NC_NOERR => c"No error",
        NC_EBADID => c"NetCDF: Not a valid ID",
        NC_ENFILE => c"NetCDF: Too many files open",
        NC_EEXIST => c"NetCDF: File exists && NC_NOCLOBBER",
        NC_EINVAL => c"NetCDF: Invalid argument",
        NC_EPERM => c"NetCDF: Write to read only",
        NC_ENOTINDEFINE => c"NetCDF: Operation not allowed in data mode",
        NC_EINDEFINE => c"NetCDF: Operation not allowed in define mode",
        NC_EINVALCOORDS => c"NetCDF: Index exceeds dimension bound",
        NC_ENAMEINUSE => c"NetCDF: String match to name in use",
        NC_ENOTATT => c"NetCDF: Attribute not found",
        NC_EBADTYPE => c"NetCDF: Not a valid data type or _FillValue type mismatch",
        NC_EBADDIM => c"NetCDF: Invalid dimension ID or name",
        NC_EUNLIMPOS => c"NetCDF: NC_UNLIMITED in the wrong index",
        NC_ENOTVAR => c"NetCDF: Variable not found",
        NC_EGLOBAL => c"NetCDF: Action prohibited on NC_GLOBAL varid",
        NC_ENOTNC => c"NetCDF: Unknown file format",
        NC_EMAXNAME => c"NetCDF: Name too long",
        NC_EUNLIMIT => c"NetCDF: NC_UNLIMITED size already in use",
        NC_EEDGE => c"NetCDF: Start+count exceeds dimension bound",
        NC_ESTRIDE => c"NetCDF: Illegal stride",
        NC_EBADNAME => c"NetCDF: Name contains illegal characters",
        NC_ENOMEM => c"NetCDF: Memory allocation (malloc) failure",
        NC_EHDFERR => c"NetCDF: HDF error",
        NC_EDIMMETA => c"NetCDF: Problem with dimension metadata.",
        NC_ENOTNC4 => c"NetCDF: Attempting netcdf-4 operation on netcdf-3 file",
        NC_ESTRICTNC3 => c"NetCDF: Attempting netcdf-4 operation on strict nc3 netcdf-4 file",
        NC_EBADGRPID => c"NetCDF: Bad group ID",
        NC_EBADTYPID => c"NetCDF: Bad type ID",
        NC_ELATEDEF => c"NetCDF: Attempt to define var properties, like deflate, after enddef.",
        NC_ENOGRP => c"NetCDF: No group found.",
        _ => c"Unknown Error",
    };
    message.as_ptr()
}

pub unsafe fn nc_create(path: *const c_char, cmode: c_int, ncidp: *mut c_int) -> c_int {
    let path = match unsafe { read_str(path) } {
        Ok(path) => PathBuf::from(path),
        Err(code) => return code,
    };
    if cmode & NC_NOCLOBBER != 0 && path.exists() {
        return NC_EEXIST;
    }
    let format = if cmode & NC_NETCDF4 != 0 {
        Format::NetCdf4
    } else {
        Format::Classic
    };
    let dataset = Dataset {
        image: Image {
            format,
            groups: vec![GroupNode::new("/".to_string(), None)],
            dims: Vec::new(),
        },
        path: Some(path),
        writable: true,
        define_mode: true,
        fill_mode: NC_FILL,
    };
    if let Err(code) = dataset.persist() {
        return code;
    }
    match engine().register(dataset) {
        Ok(ncid) => {
            unsafe { write_out(ncidp, ncid) };
            NC_NOERR
        }
        Err(code) => code,
    }
}

pub unsafe fn nc_open(path: *const c_char, mode: c_int, ncidp: *mut c_int) -> c_int {
    let path = match unsafe { read_str(path) } {
        Ok(path) => PathBuf::from(path),
        Err(code) => return code,
    };
    let image = match read_file(&path).and_then(|bytes| load_image(&bytes)) {
        Ok(image) => image,
        Err(code) => return code,
    };
    let dataset = Dataset {
        image,
        path: Some(path),
        writable: mode & NC_WRITE != 0,
        define_mode: false,
        fill_mode: NC_FILL,
    };
    match engine().register(dataset) {
        Ok(ncid) => {
            unsafe { write_out(ncidp, ncid) };
            NC_NOERR
        }
        Err(code) => code,
    }
}

/// Memory datasets are read-only regardless of `mode`.
pub unsafe fn nc_open_mem(
    _path: *const c_char,
    _mode: c_int,
    size: usize,
    memory: *mut c_void,
    ncidp: *mut c_int,
) -> c_int {
    if memory.is_null() {
        return NC_EINVAL;
    }
    let bytes = unsafe { slice::from_raw_parts(memory as *const u8, size) };
    let image = match load_image(bytes) {
        Ok(image) => image,
        Err(code) => return code,
    };
    let dataset = Dataset {
        image,
        path: None,
        writable: false,
        define_mode: false,
        fill_mode: NC_FILL,
    };
    match engine().register(dataset) {
        Ok(ncid) => {
            unsafe { write_out(ncidp, ncid) };
            NC_NOERR
        }
        Err(code) => code,
    }
}

pub unsafe fn nc_close(ncid: c_int) -> c_int {
    let mut engine = engine();
    if let Err(code) = engine.locate(ncid) {
        return code;
    }
    if ncid & GROUP_MASK != 0 {
        return NC_EBADGRPID;
    }
    let Some(mut dataset) = engine.datasets.remove(&(ncid >> GROUP_BITS)) else {
        return NC_EBADID;
    };
    if dataset.define_mode {
        return status(dataset.end_define());
    }
    status(dataset.persist())
}

pub unsafe fn nc_sync(ncid: c_int) -> c_int {
    status(with_group(ncid, |dataset, _| {
        if dataset.define_mode {
            return dataset.enter_data();
        }
        dataset.persist()
    }))
}

pub unsafe fn nc_redef(ncid: c_int) -> c_int {
    status(with_group(ncid, |dataset, grp| {
        if grp != 0 {
            return Err(NC_EBADGRPID);
        }
        dataset.require_writable()?;
        if dataset.define_mode {
            return Err(NC_EINDEFINE);
        }
        dataset.define_mode = true;
        Ok(())
    }))
}

pub unsafe fn nc_enddef(ncid: c_int) -> c_int {
    status(with_group(ncid, |dataset, _| {
        if !dataset.define_mode {
            return if dataset.is_classic() {
                Err(NC_ENOTINDEFINE)
            } else {
                Ok(())
            };
        }
        dataset.end_define()
    }))
}

pub unsafe fn nc_set_fill(ncid: c_int, fillmode: c_int, old_modep: *mut c_int) -> c_int {
    status(with_group(ncid, |dataset, _| {
        dataset.require_writable()?;
        if fillmode != NC_FILL && fillmode != NC_NOFILL {
            return Err(NC_EINVAL);
        }
        unsafe { write_out(old_modep, dataset.fill_mode) };
        dataset.fill_mode = fillmode;
        Ok(())
    }))
}

pub unsafe fn nc_inq_natts(ncid: c_int, nattsp: *mut c_int) -> c_int {
    status(with_group(ncid, |dataset, grp| {
        unsafe { write_out(nattsp, dataset.group(grp).atts.len() as c_int) };
        Ok(())
    }))
}

pub unsafe fn nc_inq_varids(ncid: c_int, nvars: *mut c_int, varids: *mut c_int) -> c_int {
    status(with_group(ncid, |dataset, grp| {
        let ids: Vec<c_int> = (0..dataset.group(grp).vars.len() as c_int).collect();
        unsafe {
            write_out(nvars, ids.len() as c_int);
            write_list(varids, &ids);
        }
        Ok(())
    }))
}

pub unsafe fn nc_inq_varid(ncid: c_int, name: *const c_char, varidp: *mut c_int) -> c_int {
    status(with_group(ncid, |dataset, grp| {
        let name = unsafe { read_str(name) }?;
        let index = dataset
            .group(grp)
            .vars
            .iter()
            .position(|var| var.name == name)
            .ok_or(NC_ENOTVAR)?;
        unsafe { write_out(varidp, index as c_int) };
        Ok(())
    }))
}

pub unsafe fn nc_def_grp(parent_ncid: c_int, name: *const c_char, new_ncid: *mut c_int) -> c_int {
    status(with_group(parent_ncid, |dataset, grp| {
        if dataset.is_classic() {
            return Err(NC_ENOTNC4);
        }
        let name = unsafe { read_str(name) }?;
        validate_name(&name)?;
        dataset.enter_define()?;
        if dataset.name_taken_by_var_or_group(grp, &name) {
            return Err(NC_ENAMEINUSE);
        }
        let index = dataset.image.groups.len();
        if index > GROUP_MASK as usize {
            return Err(NC_ENOMEM);
        }
        dataset.image.groups.push(GroupNode::new(name, Some(grp)));
        dataset.group_mut(grp).children.push(index);
        unsafe { write_out(new_ncid, (parent_ncid & !GROUP_MASK) | index as c_int) };
        Ok(())
    }))
}

pub unsafe fn nc_inq_grpname(ncid: c_int, name: *mut c_char) -> c_int {
    status(with_group(ncid, |dataset, grp| {
        unsafe { write_name(name, &dataset.group(grp).name) };
        Ok(())
    }))
}

pub unsafe fn nc_inq_grps(ncid: c_int, numgrps: *mut c_int, ncids: *mut c_int) -> c_int {
    status(with_group(ncid, |dataset, grp| {
        let base = ncid & !GROUP_MASK;
        let ids: Vec<c_int> = dataset
            .group(grp)
            .children
            .iter()
            .map(|&child| base | child as c_int)
            .collect();
        unsafe {
            write_out(numgrps, ids.len() as c_int);
            write_list(ncids, &ids);
        }
        Ok(())
    }))
}

pub unsafe fn nc_inq_grp_ncid(ncid: c_int, grp_name: *const c_char, grp_ncid: *mut c_int) -> c_int {
    status(with_group(ncid, |dataset, grp| {
        let name = unsafe { read_str(grp_name) }?;
        let child = dataset
            .group(grp)
            .children
            .iter()
            .copied()
            .find(|&child| dataset.group(child).name == name)
            .ok_or(NC_ENOGRP)?;
        unsafe { write_out(grp_ncid, (ncid & !GROUP_MASK) | child as c_int) };
        Ok(())
    }))
}

pub unsafe fn nc_inq_grp_parent(ncid: c_int, parent_ncid: *mut c_int) -> c_int {
    status(with_group(ncid, |dataset, grp| {
        let parent = dataset.group(grp).parent.ok_or(NC_ENOGRP)?;
        unsafe { write_out(parent_ncid, (ncid & !GROUP_MASK) | parent as c_int) };
        Ok(())
    }))
}

pub unsafe fn nc_def_dim(ncid: c_int, name: *const c_char, len: usize, idp: *mut c_int) -> c_int {
    status(with_group(ncid, |dataset, grp| {
        let name = unsafe { read_str(name) }?;
        validate_name(&name)?;
        dataset.enter_define()?;
        let taken = dataset
            .group(grp)
            .dimids
            .iter()
            .any(|&dimid| dataset.image.dims[dimid as usize].name == name);
        if taken {
            return Err(NC_ENAMEINUSE);
        }
        let unlimited = len == NC_UNLIMITED;
        if unlimited && dataset.is_classic() && dataset.image.dims.iter().any(|dim| dim.unlimited) {
            return Err(NC_EUNLIMIT);
        }
        let dimid = dataset.image.dims.len() as c_int;
        dataset.image.dims.push(Dim {
            name,
            len,
            unlimited,
        });
        dataset.group_mut(grp).dimids.push(dimid);
        unsafe { write_out(idp, dimid) };
        Ok(())
    }))
}

pub unsafe fn nc_inq_dim(ncid: c_int, dimid: c_int, name: *mut c_char, lenp: *mut usize) -> c_int {
    status(with_group(ncid, |dataset, grp| {
        let dim = dataset.dim(grp, dimid)?;
        unsafe {
            write_name(name, &dim.name);
            write_out(lenp, dim.len);
        }
        Ok(())
    }))
}

pub unsafe fn nc_inq_dimlen(ncid: c_int, dimid: c_int, lenp: *mut usize) -> c_int {
    status(with_group(ncid, |dataset, grp| {
        let len = dataset.dim(grp, dimid)?.len;
        unsafe { write_out(lenp, len) };
        Ok(())
    }))
}

pub unsafe fn nc_inq_dimid(ncid: c_int, name: *const c_char, idp: *mut c_int) -> c_int {
    status(with_group(ncid, |dataset, grp| {
        let name = unsafe { read_str(name) }?;
        let dimid = dataset
            .visible_dimids(grp)
            .into_iter()
            .find(|&dimid| dataset.image.dims[dimid as usize].name == name)
            .ok_or(NC_EBADDIM)?;
        unsafe { write_out(idp, dimid) };
        Ok(())
    }))
}

pub unsafe fn nc_inq_dimids(
    ncid: c_int,
    ndims: *mut c_int,
    dimids: *mut c_int,
    include_parents: c_int,
) -> c_int {
    status(with_group(ncid, |dataset, grp| {
        let ids = if include_parents != 0 {
            dataset.visible_dimids(grp)
        } else {
            dataset.group(grp).dimids.clone()
        };
        unsafe {
            write_out(ndims, ids.len() as c_int);
            write_list(dimids, &ids);
        }
        Ok(())
    }))
}

pub unsafe fn nc_inq_unlimdims(
    ncid: c_int,
    nunlimdimsp: *mut c_int,
    unlimdimidsp: *mut c_int,
) -> c_int {
    // Dimensions defined in this group only; ancestors are queried separately.
    status(with_group(ncid, |dataset, grp| {
        let ids: Vec<c_int> = dataset
            .group(grp)
            .dimids
            .iter()
            .copied()
            .filter(|&dimid| dataset.image.dims[dimid as usize].unlimited)
            .collect();
        unsafe {
            write_out(nunlimdimsp, ids.len() as c_int);
            write_list(unlimdimidsp, &ids);
        }
        Ok(())
    }))
}

pub unsafe fn nc_def_var(
    ncid: c_int,
    name: *const c_char,
    xtype: nc_type,
    ndims: c_int,
    dimidsp: *const c_int,
    varidp: *mut c_int,
) -> c_int {
    status(with_group(ncid, |dataset, grp| {
        let name = unsafe { read_str(name) }?;
        validate_name(&name)?;
        check_type(dataset, xtype)?;
        let ndims = usize::try_from(ndims).map_err(|_| NC_EINVAL)?;
        let dimids = if ndims == 0 {
            Vec::new()
        } else if dimidsp.is_null() {
            return Err(NC_EINVAL);
        } else {
            unsafe { slice::from_raw_parts(dimidsp, ndims) }.to_vec()
        };
        dataset.enter_define()?;
        for (position, &dimid) in dimids.iter().enumerate() {
            let dim = dataset.dim(grp, dimid)?;
            if dim.unlimited && position != 0 && dataset.is_classic() {
                return Err(NC_EUNLIMPOS);
            }
        }
        if dataset.name_taken_by_var_or_group(grp, &name) {
            return Err(NC_ENAMEINUSE);
        }
        let group = dataset.group_mut(grp);
        let varid = group.vars.len() as c_int;
        group.vars.push(Var {
            name,
            xtype,
            extent: vec![0; dimids.len()],
            dimids,
            atts: Vec::new(),
            storage: StorageSettings::default(),
            values: Values::empty_for(xtype),
            committed: false,
        });
        unsafe { write_out(varidp, varid) };
        Ok(())
    }))
}

pub unsafe fn nc_inq_var(
    ncid: c_int,
    varid: c_int,
    name: *mut c_char,
    xtypep: *mut nc_type,
    ndimsp: *mut c_int,
    dimidsp: *mut c_int,
    nattsp: *mut c_int,
) -> c_int {
    status(with_group(ncid, |dataset, grp| {
        let var = dataset.var(grp, varid)?;
        unsafe {
            write_name(name, &var.name);
            write_out(xtypep, var.xtype);
            write_out(ndimsp, var.dimids.len() as c_int);
            write_list(dimidsp, &var.dimids);
            write_out(nattsp, var.atts.len() as c_int);
        }
        Ok(())
    }))
}

pub unsafe fn nc_inq_varndims(ncid: c_int, varid: c_int, ndimsp: *mut c_int) -> c_int {
    status(with_group(ncid, |dataset, grp| {
        let ndims = dataset.var(grp, varid)?.dimids.len();
        unsafe { write_out(ndimsp, ndims as c_int) };
        Ok(())
    }))
}

pub unsafe fn nc_inq_varnatts(ncid: c_int, varid: c_int, nattsp: *mut c_int) -> c_int {
    status(with_group(ncid, |dataset, grp| {
        let natts = dataset.atts(grp, varid)?.len();
        unsafe { write_out(nattsp, natts as c_int) };
        Ok(())
    }))
}

pub unsafe fn nc_inq_type(ncid: c_int, xtype: nc_type, name: *mut c_char, size: *mut usize) -> c_int {
    status(with_group(ncid, |_, _| {
        let type_name = type_name(xtype).ok_or(NC_EBADTYPE)?;
        let type_size = type_size(xtype).ok_or(NC_EBADTYPE)?;
        unsafe {
            write_name(name, type_name);
            write_out(size, type_size);
        }
        Ok(())
    }))
}

pub unsafe fn nc_inq_att(
    ncid: c_int,
    varid: c_int,
    name: *const c_char,
    xtypep: *mut nc_type,
    lenp: *mut usize,
) -> c_int {
    status(with_group(ncid, |dataset, grp| {
        let name = unsafe { read_str(name) }?;
        let att = dataset
            .atts(grp, varid)?
            .iter()
            .find(|att| att.name == name)
            .ok_or(NC_ENOTATT)?;
        unsafe {
            write_out(xtypep, att.xtype);
            write_out(lenp, att.len);
        }
        Ok(())
    }))
}

pub unsafe fn nc_inq_attname(ncid: c_int, varid: c_int, attnum: c_int, name: *mut c_char) -> c_int {
    status(with_group(ncid, |dataset, grp| {
        let att = usize::try_from(attnum)
            .ok()
            .and_then(|index| dataset.atts(grp, varid).ok()?.get(index))
            .ok_or_else(|| dataset.atts(grp, varid).err().unwrap_or(NC_ENOTATT))?;
        unsafe { write_name(name, &att.name) };
        Ok(())
    }))
}

pub unsafe fn nc_put_att(
    ncid: c_int,
    varid: c_int,
    name: *const c_char,
    xtype: nc_type,
    len: usize,
    op: *const c_void,
) -> c_int {
    status(with_group(ncid, |dataset, grp| {
        let name = unsafe { read_str(name) }?;
        validate_name(&name)?;
        dataset.require_writable()?;
        check_type(dataset, xtype)?;
        let existing_len = dataset
            .atts(grp, varid)?
            .iter()
            .find(|att| att.name == name)
            .map(|att| att.len);
        // Classic data mode may only overwrite an attribute in place without growing it.
        let in_place = !dataset.define_mode
            && dataset.is_classic()
            && existing_len.is_some_and(|old| len <= old);
        if !in_place {
            dataset.enter_define()?;
        }
        let values = unsafe { values_from_raw(xtype, len, op) }?;
        let att = Att {
            name,
            xtype,
            len,
            values,
        };
        let atts = dataset.atts_mut(grp, varid)?;
        match atts.iter_mut().find(|existing| existing.name == att.name) {
            Some(existing) => *existing = att,
            None => atts.push(att),
        }
        Ok(())
    }))
}

pub unsafe fn nc_get_att(ncid: c_int, varid: c_int, name: *const c_char, ip: *mut c_void) -> c_int {
    status(with_group(ncid, |dataset, grp| {
        let name = unsafe { read_str(name) }?;
        let att = dataset
            .atts(grp, varid)?
            .iter()
            .find(|att| att.name == name)
            .ok_or(NC_ENOTATT)?;
        unsafe { values_to_raw(&att.values, ip) }
    }))
}

pub unsafe fn nc_del_att(ncid: c_int, varid: c_int, name: *const c_char) -> c_int {
    status(with_group(ncid, |dataset, grp| {
        let name = unsafe { read_str(name) }?;
        dataset.require_writable()?;
        let index = dataset
            .atts(grp, varid)?
            .iter()
            .position(|att| att.name == name)
            .ok_or(NC_ENOTATT)?;
        dataset.enter_define()?;
        dataset.atts_mut(grp, varid)?.remove(index);
        Ok(())
    }))
}

pub unsafe fn nc_get_vara(
    ncid: c_int,
    varid: c_int,
    startp: *const usize,
    countp: *const usize,
    ip: *mut c_void,
) -> c_int {
    unsafe { nc_get_vars(ncid, varid, startp, countp, ptr::null(), ip) }
}

pub unsafe fn nc_put_vara(
    ncid: c_int,
    varid: c_int,
    startp: *const usize,
    countp: *const usize,
    op: *const c_void,
) -> c_int {
    unsafe { nc_put_vars(ncid, varid, startp, countp, ptr::null(), op) }
}

pub unsafe fn nc_get_vars(
    ncid: c_int,
    varid: c_int,
    startp: *const usize,
    countp: *const usize,
    stridep: *const isize,
    ip: *mut c_void,
) -> c_int {
    status(with_group(ncid, |dataset, grp| {
        let ndims = dataset.var(grp, varid)?.dimids.len();
        let selection = unsafe { Selection::from_raw(ndims, startp, countp, stridep) }?;
        read_selection(dataset, grp, varid, &selection, ip)
    }))
}

pub unsafe fn nc_put_vars(
    ncid: c_int,
    varid: c_int,
    startp: *const usize,
    countp: *const usize,
    stridep: *const isize,
    op: *const c_void,
) -> c_int {
    status(with_group(ncid, |dataset, grp| {
        let ndims = dataset.var(grp, varid)?.dimids.len();
        let selection = unsafe { Selection::from_raw(ndims, startp, countp, stridep) }?;
        write_selection(dataset, grp, varid, &selection, op)
    }))
}

/// Shared gate for per-variable storage settings.
fn storage_settings(
    dataset: &mut Dataset,
    grp: usize,
    varid: c_int,
) -> Result<&mut StorageSettings, c_int> {
    if dataset.is_classic() {
        return Err(NC_ENOTNC4);
    }
    dataset.require_writable()?;
    if varid == NC_GLOBAL {
        return Err(NC_EGLOBAL);
    }
    if dataset.var(grp, varid)?.committed {
        return Err(NC_ELATEDEF);
    }
    dataset.enter_define()?;
    Ok(&mut dataset.var_mut(grp, varid)?.storage)
}

fn default_chunks(dataset: &Dataset, grp: usize, varid: c_int) -> Result<Vec<usize>, c_int> {
    let var = dataset.var(grp, varid)?;
    Ok(dataset
        .dim_lens(var)
        .into_iter()
        .map(|len| len.max(1))
        .collect())
}

pub unsafe fn nc_def_var_deflate(
    ncid: c_int,
    varid: c_int,
    shuffle: c_int,
    deflate: c_int,
    deflate_level: c_int,
) -> c_int {
    status(with_group(ncid, |dataset, grp| {
        if !(0..=9).contains(&deflate_level) {
            return Err(NC_EINVAL);
        }
        let chunks = default_chunks(dataset, grp, varid)?;
        let storage = storage_settings(dataset, grp, varid)?;
        if storage.szip.is_some() && deflate != 0 {
            return Err(NC_EINVAL);
        }
        storage.shuffle = shuffle != 0;
        storage.deflate = deflate != 0;
        storage.deflate_level = deflate_level;
        if (storage.deflate || storage.shuffle) && (storage.contiguous || storage.chunks.is_empty()) {
            storage.contiguous = false;
            storage.chunks = chunks;
        }
        Ok(())
    }))
}

pub unsafe fn nc_inq_var_deflate(
    ncid: c_int,
    varid: c_int,
    shufflep: *mut c_int,
    deflatep: *mut c_int,
    deflate_levelp: *mut c_int,
) -> c_int {
    status(with_group(ncid, |dataset, grp| {
        let storage = &dataset.var(grp, varid)?.storage;
        unsafe {
            write_out(shufflep, storage.shuffle as c_int);
            write_out(deflatep, storage.deflate as c_int);
            write_out(deflate_levelp, storage.deflate_level);
        }
        Ok(())
    }))
}

pub unsafe fn nc_def_var_chunking(
    ncid: c_int,
    varid: c_int,
    storage: c_int,
    chunksizesp: *const usize,
) -> c_int {
    status(with_group(ncid, |dataset, grp| {
        let var = dataset.var(grp, varid)?;
        let ndims = var.dimids.len();
        let has_unlimited = var
            .dimids
            .iter()
            .any(|&dimid| dataset.image.dims[dimid as usize].unlimited);
        let settings = storage_settings(dataset, grp, varid)?;
        match storage {
            NC_CONTIGUOUS => {
                if has_unlimited || settings.deflate || settings.fletcher32 || settings.szip.is_some()
                {
                    return Err(NC_EINVAL);
                }
                settings.contiguous = true;
                settings.chunks.clear();
            }
            NC_CHUNKED => {
                if ndims == 0 {
                    return Err(NC_EINVAL);
                }
                if chunksizesp.is_null() {
                    return Err(NC_EINVAL);
                }
                let chunks = unsafe { slice::from_raw_parts(chunksizesp, ndims) }.to_vec();
                if chunks.contains(&0) {
                    return Err(NC_EINVAL);
                }
                settings.contiguous = false;
                settings.chunks = chunks;
            }
            _ => return Err(NC_EINVAL),
        }
        Ok(())
    }))
}

pub unsafe fn nc_inq_var_chunking(
    ncid: c_int,
    varid: c_int,
    storagep: *mut c_int,
    chunksizesp: *mut usize,
) -> c_int {
    status(with_group(ncid, |dataset, grp| {
        let storage = &dataset.var(grp, varid)?.storage;
        let mode = if storage.chunks.is_empty() {
            NC_CONTIGUOUS
        } else {
            NC_CHUNKED
        };
        unsafe {
            write_out(storagep, mode);
            if !chunksizesp.is_null() && mode == NC_CHUNKED {
                ptr::copy_nonoverlapping(storage.chunks.as_ptr(), chunksizesp, storage.chunks.len());
            }
        }
        Ok(())
    }))
}

pub unsafe fn nc_def_var_fletcher32(ncid: c_int, varid: c_int, fletcher32: c_int) -> c_int {
    status(with_group(ncid, |dataset, grp| {
        let chunks = default_chunks(dataset, grp, varid)?;
        let storage = storage_settings(dataset, grp, varid)?;
        storage.fletcher32 = fletcher32 != 0;
        if storage.fletcher32 && storage.chunks.is_empty() {
            storage.contiguous = false;
            storage.chunks = chunks;
        }
        Ok(())
    }))
}

pub unsafe fn nc_def_var_endian(ncid: c_int, varid: c_int, endian: c_int) -> c_int {
    status(with_group(ncid, |dataset, grp| {
        if !matches!(endian, NC_ENDIAN_NATIVE | NC_ENDIAN_LITTLE | NC_ENDIAN_BIG) {
            return Err(NC_EINVAL);
        }
        if dataset.var(grp, varid)?.xtype == NC_STRING {
            return Err(NC_EINVAL);
        }
        storage_settings(dataset, grp, varid)?.endian = endian;
        Ok(())
    }))
}

pub unsafe fn nc_def_var_szip(
    ncid: c_int,
    varid: c_int,
    options_mask: c_int,
    pixels_per_block: c_int,
) -> c_int {
    status(with_group(ncid, |dataset, grp| {
        if options_mask != NC_SZIP_EC && options_mask != NC_SZIP_NN {
            return Err(NC_EINVAL);
        }
        if pixels_per_block <= 0 || pixels_per_block > 32 || pixels_per_block % 2 != 0 {
            return Err(NC_EINVAL);
        }
        let chunks = default_chunks(dataset, grp, varid)?;
        let storage = storage_settings(dataset, grp, varid)?;
        if storage.deflate {
            return Err(NC_EINVAL);
        }
        storage.szip = Some((options_mask, pixels_per_block));
        if storage.chunks.is_empty() {
            storage.contiguous = false;
            storage.chunks = chunks;
        }
        Ok(())
    }))
}

/// Release strings previously handed out by `nc_get_att`/`nc_get_vara`.
pub unsafe fn nc_free_string(len: usize, data: *mut *mut c_char) -> c_int {
    if data.is_null() {
        return if len == 0 { NC_NOERR } else { NC_EINVAL };
    }
    let slots = unsafe { slice::from_raw_parts_mut(data, len) };
    for slot in slots {
        if !slot.is_null() {
            drop(unsafe { CString::from_raw(*slot) });
            *slot = ptr::null_mut();
        }
    }
    NC_NOERR
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_nc4(dir: &tempfile::TempDir, name: &str) -> c_int {
        let path = CString::new(dir.path().join(name).to_str().expect("utf8")).expect("path");
        let mut ncid = 0;
        let rc = unsafe { nc_create(path.as_ptr(), NC_NETCDF4, &mut ncid) };
        assert_eq!(rc, NC_NOERR);
        ncid
    }

    #[test]
    fn positions_walk_row_major_with_stride() {
        let mut seen = Vec::new();
        for_each_position(&[1, 0], &[2, 2], &[2, 3], |pos| seen.push(pos.to_vec()));
        assert_eq!(seen, vec![vec![1, 0], vec![1, 3], vec![3, 0], vec![3, 3]]);

        let mut scalar = 0;
        for_each_position(&[], &[], &[], |_| scalar += 1);
        assert_eq!(scalar, 1);
    }

    #[test]
    fn unlimited_dimension_grows_on_write() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ncid = create_nc4(&dir, "grow.nc");
        let mut dimid = 0;
        let mut varid = 0;
        unsafe {
            assert_eq!(nc_def_dim(ncid, c"time".as_ptr(), NC_UNLIMITED, &mut dimid), NC_NOERR);
            assert_eq!(
                nc_def_var(ncid, c"t".as_ptr(), NC_INT, 1, &dimid, &mut varid),
                NC_NOERR
            );
        }

        let data = [7i32, 8, 9];
        let start = [2usize];
        let count = [3usize];
        let rc = unsafe {
            nc_put_vara(ncid, varid, start.as_ptr(), count.as_ptr(), data.as_ptr() as *const c_void)
        };
        assert_eq!(rc, NC_NOERR);

        let mut len = 0usize;
        assert_eq!(unsafe { nc_inq_dimlen(ncid, dimid, &mut len) }, NC_NOERR);
        assert_eq!(len, 5);

        let mut out = [0i32; 5];
        let start = [0usize];
        let count = [5usize];
        let rc = unsafe {
            nc_get_vara(ncid, varid, start.as_ptr(), count.as_ptr(), out.as_mut_ptr() as *mut c_void)
        };
        assert_eq!(rc, NC_NOERR);
        assert_eq!(out, [-2147483647, -2147483647, 7, 8, 9]);

        let count = [6usize];
        let rc = unsafe {
            nc_get_vara(ncid, varid, start.as_ptr(), count.as_ptr(), out.as_mut_ptr() as *mut c_void)
        };
        assert_eq!(rc, NC_EEDGE);
        assert_eq!(unsafe { nc_close(ncid) }, NC_NOERR);
    }

    #[test]
    fn unlimited_lists_cover_the_defining_group_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ncid = create_nc4(&dir, "unlim.nc");
        let (mut time, mut sub, mut n) = (0, 0, -1);
        let mut ids = [-1; 2];
        unsafe {
            assert_eq!(nc_def_dim(ncid, c"time".as_ptr(), NC_UNLIMITED, &mut time), NC_NOERR);
            assert_eq!(nc_def_grp(ncid, c"sub".as_ptr(), &mut sub), NC_NOERR);
            assert_eq!(nc_inq_unlimdims(sub, &mut n, ids.as_mut_ptr()), NC_NOERR);
            assert_eq!(n, 0);
            assert_eq!(nc_inq_unlimdims(ncid, &mut n, ids.as_mut_ptr()), NC_NOERR);
        }
        assert_eq!((n, ids[0]), (1, time));
        assert_eq!(unsafe { nc_close(ncid) }, NC_NOERR);
    }

    #[test]
    fn unallocatable_growth_is_a_status_not_a_panic() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ncid = create_nc4(&dir, "far.nc");
        let mut dimid = 0;
        let mut varid = 0;
        unsafe {
            assert_eq!(nc_def_dim(ncid, c"time".as_ptr(), NC_UNLIMITED, &mut dimid), NC_NOERR);
            assert_eq!(
                nc_def_var(ncid, c"t".as_ptr(), NC_INT, 1, &dimid, &mut varid),
                NC_NOERR
            );
        }

        let data = [5i32];
        let count = [1usize];
        for far in [usize::MAX / 2, usize::MAX] {
            let start = [far];
            let rc = unsafe {
                nc_put_vara(ncid, varid, start.as_ptr(), count.as_ptr(), data.as_ptr() as *const c_void)
            };
            assert_eq!(rc, NC_ENOMEM, "start {far}");
        }

        let mut len = usize::MAX;
        assert_eq!(unsafe { nc_inq_dimlen(ncid, dimid, &mut len) }, NC_NOERR);
        assert_eq!(len, 0);

        let start = [0usize];
        let rc = unsafe {
            nc_put_vara(ncid, varid, start.as_ptr(), count.as_ptr(), data.as_ptr() as *const c_void)
        };
        assert_eq!(rc, NC_NOERR);
        assert_eq!(unsafe { nc_close(ncid) }, NC_NOERR);
    }

    #[test]
    fn oversized_read_counts_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ncid = create_nc4(&dir, "counts.nc");
        let mut dimids = [0; 2];
        let mut varid = 0;
        unsafe {
            assert_eq!(nc_def_dim(ncid, c"t".as_ptr(), NC_UNLIMITED, &mut dimids[0]), NC_NOERR);
            assert_eq!(nc_def_dim(ncid, c"x".as_ptr(), 3, &mut dimids[1]), NC_NOERR);
            assert_eq!(
                nc_def_var(ncid, c"v".as_ptr(), NC_INT, 2, dimids.as_ptr(), &mut varid),
                NC_NOERR
            );
        }
        let mut out = [0i32; 1];
        let start = [0usize, 0];
        let count = [usize::MAX, 2];
        let rc = unsafe {
            nc_get_vara(ncid, varid, start.as_ptr(), count.as_ptr(), out.as_mut_ptr() as *mut c_void)
        };
        assert_eq!(rc, NC_EEDGE);
        assert_eq!(unsafe { nc_close(ncid) }, NC_NOERR);
    }

    #[test]
    fn strings_are_engine_allocated_and_freed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ncid = create_nc4(&dir, "strings.nc");
        let values = [c"alpha".as_ptr(), c"beta".as_ptr()];
        let rc = unsafe {
            nc_put_att(
                ncid,
                NC_GLOBAL,
                c"names".as_ptr(),
                NC_STRING,
                2,
                values.as_ptr() as *const c_void,
            )
        };
        assert_eq!(rc, NC_NOERR);

        let mut slots: [*mut c_char; 2] = [ptr::null_mut(); 2];
        let rc = unsafe {
            nc_get_att(ncid, NC_GLOBAL, c"names".as_ptr(), slots.as_mut_ptr() as *mut c_void)
        };
        assert_eq!(rc, NC_NOERR);
        let first = unsafe { CStr::from_ptr(slots[0]) }.to_str().expect("utf8").to_owned();
        assert_eq!(first, "alpha");
        assert_eq!(unsafe { nc_free_string(2, slots.as_mut_ptr()) }, NC_NOERR);
        assert!(slots.iter().all(|slot| slot.is_null()));
        assert_eq!(unsafe { nc_close(ncid) }, NC_NOERR);
    }

    #[test]
    fn classic_format_is_strict_about_modes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = CString::new(dir.path().join("classic.nc").to_str().expect("utf8")).expect("path");
        let mut ncid = 0;
        assert_eq!(unsafe { nc_create(path.as_ptr(), NC_CLOBBER, &mut ncid) }, NC_NOERR);

        let mut grp = 0;
        assert_eq!(unsafe { nc_def_grp(ncid, c"g".as_ptr(), &mut grp) }, NC_ENOTNC4);

        let mut dimid = 0;
        assert_eq!(unsafe { nc_def_dim(ncid, c"x".as_ptr(), 4, &mut dimid) }, NC_NOERR);
        assert_eq!(unsafe { nc_enddef(ncid) }, NC_NOERR);
        assert_eq!(unsafe { nc_enddef(ncid) }, NC_ENOTINDEFINE);
        assert_eq!(
            unsafe { nc_def_dim(ncid, c"y".as_ptr(), 4, &mut dimid) },
            NC_ENOTINDEFINE
        );
        assert_eq!(unsafe { nc_redef(ncid) }, NC_NOERR);
        assert_eq!(unsafe { nc_redef(ncid) }, NC_EINDEFINE);
        assert_eq!(unsafe { nc_close(ncid) }, NC_NOERR);
    }

    #[test]
    fn snapshot_survives_close_and_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("persist.nc");
        let cpath = CString::new(path.to_str().expect("utf8")).expect("path");
        let mut ncid = 0;
        assert_eq!(
            unsafe { nc_create(cpath.as_ptr(), NC_NETCDF4 | NC_NOCLOBBER, &mut ncid) },
            NC_NOERR
        );
        assert_eq!(
            unsafe { nc_create(cpath.as_ptr(), NC_NETCDF4 | NC_NOCLOBBER, &mut ncid) },
            NC_EEXIST
        );
        let mut dimid = 0;
        unsafe { nc_def_dim(ncid, c"x".as_ptr(), 3, &mut dimid) };
        assert_eq!(unsafe { nc_close(ncid) }, NC_NOERR);

        let mut reopened = 0;
        assert_eq!(unsafe { nc_open(cpath.as_ptr(), NC_NOWRITE, &mut reopened) }, NC_NOERR);
        let mut len = 0usize;
        let mut name = [0 as c_char; NC_MAX_NAME + 1];
        assert_eq!(
            unsafe { nc_inq_dim(reopened, dimid, name.as_mut_ptr(), &mut len) },
            NC_NOERR
        );
        assert_eq!(len, 3);
        assert_eq!(unsafe { CStr::from_ptr(name.as_ptr()) }, c"x");
        assert_eq!(unsafe { nc_redef(reopened) }, NC_EPERM);
        assert_eq!(unsafe { nc_close(reopened) }, NC_NOERR);

        let missing = CString::new(dir.path().join("nope.nc").to_str().expect("utf8")).expect("path");
        assert_eq!(
            unsafe { nc_open(missing.as_ptr(), NC_NOWRITE, &mut reopened) },
            libc::ENOENT
        );
    }
}
