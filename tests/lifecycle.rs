// Container lifecycle: define/data modes, permissions, closing and handle validity.
use std::thread;
use std::time::Duration;

use ncfile::{
    AttributeProvider, Chunking, CreateOptions, Endian, ErrorKind, FillMode, Format, OpenMode,
    SzipOptions, create, open,
};

#[test]
fn open_and_create_report_path_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("exists.nc");

    let err = open(&path, OpenMode::ReadOnly).expect_err("missing file");
    assert_eq!(err.kind(), ErrorKind::NotFound);

    create(&path, CreateOptions::new())
        .expect("create")
        .close()
        .expect("close");
    let err = create(&path, CreateOptions::new()).expect_err("no overwrite");
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    assert!(err.to_string().contains("exists.nc"));

    create(&path, CreateOptions::new().overwrite(true))
        .expect("overwrite")
        .close()
        .expect("close");
}

#[test]
fn define_mode_transitions_follow_the_state_machine() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("modes.nc");
    let options = CreateOptions::new().format(Format::Classic);

    let root = create(&path, options).expect("create");
    let err = root.redefine().expect_err("new datasets start in define mode");
    assert_eq!(err.kind(), ErrorKind::AlreadyInDefineMode);

    let x = root.create_dimension("x", 3).expect("x");
    let v = root.create_variable::<i32>("v", &[x]).expect("var");
    root.end_define_mode().expect("enddef");
    v.write(&[1, 2, 3]).expect("write in data mode");

    root.redefine().expect("redefine");
    let err = root.redefine().expect_err("twice");
    assert_eq!(err.kind(), ErrorKind::AlreadyInDefineMode);
    root.set_attribute("history", 1i32).expect("attribute in define mode");
    root.end_define_mode().expect("enddef");
    root.close().expect("close");

    let root = open(&path, OpenMode::ReadOnly).expect("reopen");
    let err = root.redefine().expect_err("read-only");
    assert_eq!(err.kind(), ErrorKind::NoPermission);
    let err = root.set_attribute("x", 1i32).expect_err("read-only write");
    assert_eq!(err.kind(), ErrorKind::NoPermission);
}

#[test]
fn only_the_root_group_can_redefine() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = create(dir.path().join("subredef.nc"), CreateOptions::new()).expect("create");
    let g = root.create_group("g").expect("group");
    root.end_define_mode().expect("enddef");

    let err = g.redefine().expect_err("subgroup redefine");
    assert_eq!(err.kind(), ErrorKind::InvalidGroupHandle);

    root.redefine().expect("root redefine");
    g.set_attribute("units", "m".to_string())
        .expect("subgroup attribute in define mode");
    root.end_define_mode().expect("enddef");
}

#[test]
fn classic_format_rejects_extended_features() {
    let dir = tempfile::tempdir().expect("tempdir");
    let options = CreateOptions::new().format(Format::Classic);
    let root = create(dir.path().join("classic.nc"), options).expect("create");

    let err = root.create_group("sub").expect_err("groups need netCDF-4");
    assert_eq!(err.kind(), ErrorKind::RequiresExtendedFormat);

    let x = root.create_dimension("x", 4).expect("x");
    let v = root.create_variable::<f32>("v", &[x]).expect("var");
    let err = v
        .variable()
        .define_deflate(true, 4, false)
        .expect_err("compression needs netCDF-4");
    assert_eq!(err.kind(), ErrorKind::RequiresExtendedFormat);

    let err = root
        .create_variable::<u16>("unsigned", &[])
        .expect_err("unsigned types need netCDF-4");
    assert_eq!(err.kind(), ErrorKind::StrictLegacyModeViolation);
}

#[test]
fn storage_settings_apply_before_first_write_only() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = create(dir.path().join("storage.nc"), CreateOptions::new()).expect("create");
    let y = root.create_dimension("y", 8).expect("y");
    let x = root.create_dimension("x", 6).expect("x");
    let v = root.create_variable::<f64>("field", &[y, x]).expect("var");
    let variable = v.variable();

    variable.define_chunking(Chunking::Chunked, &[4, 3]).expect("chunking");
    variable.define_deflate(true, 5, true).expect("deflate");
    variable.define_checksum(true).expect("checksum");
    variable.define_endian(Endian::Little).expect("endian");

    let deflate = variable.deflate().expect("inquire deflate");
    assert!(deflate.enabled);
    assert!(deflate.shuffle);
    assert_eq!(deflate.level, 5);
    assert_eq!(
        variable.chunking().expect("inquire chunking"),
        (Chunking::Chunked, vec![4, 3])
    );

    let other = root.create_variable::<i32>("other", &[]).expect("scalar");
    other
        .variable()
        .define_szip(SzipOptions::NearestNeighbor, 0)
        .expect_err("odd pixels per block");

    v.write(&vec![0.5; 48]).expect("write");
    let err = variable
        .define_deflate(true, 1, false)
        .expect_err("too late");
    assert!(matches!(err.kind(), ErrorKind::UnknownEngine { .. }));
}

#[test]
fn fill_mode_returns_previous_setting() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = create(dir.path().join("fill.nc"), CreateOptions::new()).expect("create");
    assert_eq!(root.set_fill_mode(FillMode::NoFill).expect("set"), FillMode::Fill);
    assert_eq!(root.set_fill_mode(FillMode::Fill).expect("set"), FillMode::NoFill);
}

#[test]
fn unwritten_elements_read_as_fill_value() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = create(dir.path().join("fillvalue.nc"), CreateOptions::new()).expect("create");
    let x = root.create_dimension("x", 4).expect("x");
    let plain = root.create_variable::<i32>("plain", &[x.clone()]).expect("plain");
    let custom = root.create_variable::<i32>("custom", &[x]).expect("custom");
    custom.set_attribute("_FillValue", -1i32).expect("fill value");

    plain.write_at(&[1], &[1], &[10]).expect("write");
    custom.write_at(&[2], &[1], &[20]).expect("write");

    assert_eq!(
        plain.read().expect("read"),
        vec![-2_147_483_647, 10, -2_147_483_647, -2_147_483_647]
    );
    assert_eq!(custom.read().expect("read"), vec![-1, -1, 20, -1]);
}

#[test]
fn out_of_bounds_slices_are_engine_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = create(dir.path().join("bounds.nc"), CreateOptions::new()).expect("create");
    let x = root.create_dimension("x", 4).expect("x");
    let v = root.create_variable::<u8>("v", &[x]).expect("var");
    v.write(&[1, 2, 3, 4]).expect("write");

    let err = v.read_at(&[2], &[3]).expect_err("past the end");
    assert!(matches!(err.kind(), ErrorKind::UnknownEngine { .. }));
    assert!(err.message().is_some_and(|m| !m.is_empty()));
    let err = v.write_at(&[4], &[1], &[9]).expect_err("fixed dimension does not grow");
    assert!(matches!(err.kind(), ErrorKind::UnknownEngine { .. }));
}

#[test]
fn closed_container_invalidates_descriptors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = create(dir.path().join("closed.nc"), CreateOptions::new()).expect("create");
    let mut x = root.create_dimension("x", 2).expect("x");
    let v = root.create_variable::<i32>("v", &[x.clone()]).expect("var");
    let alias = root.clone();

    root.close().expect("close");

    let err = alias.get_variable("v").expect_err("closed");
    assert_eq!(err.kind(), ErrorKind::InvalidContainerHandle);
    let err = v.read().expect_err("closed");
    assert_eq!(err.kind(), ErrorKind::InvalidContainerHandle);
    let err = x.refresh().expect_err("closed");
    assert_eq!(err.kind(), ErrorKind::InvalidContainerHandle);
    let err = v.number_of_attributes().expect_err("closed");
    assert_eq!(err.kind(), ErrorKind::InvalidContainerHandle);
    let err = alias.close().expect_err("closed twice");
    assert_eq!(err.kind(), ErrorKind::InvalidContainerHandle);
}

#[test]
fn readers_racing_a_close_see_data_or_a_closed_handle() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = create(dir.path().join("race.nc"), CreateOptions::new()).expect("create");
    let x = root.create_dimension("x", 64).expect("x");
    let v = root.create_variable::<i32>("v", &[x]).expect("var");
    let values: Vec<i32> = (0..64).collect();
    v.write(&values).expect("write");

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let (v, values) = (v.clone(), values.clone());
            thread::spawn(move || loop {
                match v.read() {
                    Ok(read) => assert_eq!(read, values),
                    Err(err) => {
                        assert_eq!(err.kind(), ErrorKind::InvalidContainerHandle);
                        break;
                    }
                }
            })
        })
        .collect();
    thread::sleep(Duration::from_millis(20));
    root.close().expect("close");
    for reader in readers {
        reader.join().expect("reader");
    }
}

#[test]
fn dimensions_cannot_cross_containers() {
    let dir = tempfile::tempdir().expect("tempdir");
    let first = create(dir.path().join("first.nc"), CreateOptions::new()).expect("first");
    let second = create(dir.path().join("second.nc"), CreateOptions::new()).expect("second");
    let foreign = first.create_dimension("x", 3).expect("x");

    let err = second
        .create_variable::<f32>("v", &[foreign])
        .expect_err("foreign dimension");
    assert_eq!(err.kind(), ErrorKind::InvalidContainerHandle);
    assert!(second.get_variable("v").expect("lookup").is_none());
}

#[test]
fn dropping_the_last_descriptor_closes_the_container() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("dropped.nc");
    {
        let root = create(&path, CreateOptions::new()).expect("create");
        let x = root.create_dimension("x", 2).expect("x");
        root.create_variable::<i16>("v", &[x])
            .expect("var")
            .write(&[7, 8])
            .expect("write");
    }
    let root = open(&path, OpenMode::ReadOnly).expect("reopen");
    let v = root
        .get_variable("v")
        .expect("lookup")
        .expect("present")
        .into_typed::<i16>()
        .expect("short view");
    assert_eq!(v.read().expect("read"), vec![7, 8]);
}
