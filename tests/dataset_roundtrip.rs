// End-to-end dataset round trips: define, write, close, reopen, read.
use std::fmt::Debug;

use ncfile::{
    AttributeProvider, CreateOptions, ErrorKind, ExternalType, Group, NcType, OpenMode, TypeId,
    create, library_version, open, open_memory,
};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_test_writer()
        .try_init();
}

fn roundtrip_attribute<T: NcType + PartialEq + Debug>(root: &Group, name: &str, values: Vec<T>) {
    root.set_attribute_array(name, &values).expect("set attribute");
    let attribute = root
        .get_attribute(name)
        .expect("lookup")
        .expect("attribute present");
    assert_eq!(attribute.external_type(), Some(T::EXTERNAL));
    assert_eq!(attribute.length(), values.len());
    assert_eq!(attribute.read::<T>().expect("read"), Some(values));
}

#[test]
fn written_grid_reads_back_after_reopen() {
    init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("grid.nc");

    let root = create(&path, CreateOptions::new()).expect("create");
    let lat = root.create_dimension("LAT", 10).expect("lat");
    let lon = root.create_dimension("LON", 5).expect("lon");
    let data = root
        .create_variable::<i32>("MyData", &[lat, lon])
        .expect("variable");
    let values: Vec<i32> = (0..50).collect();
    data.write(&values).expect("write");
    root.set_attribute("TITLE", "My data set".to_string())
        .expect("title");
    root.close().expect("close");

    let root = open(&path, OpenMode::ReadOnly).expect("reopen");
    let variable = root
        .get_variable("MyData")
        .expect("lookup")
        .expect("variable present");
    assert_eq!(variable.shape(), vec![10, 5]);
    assert_eq!(variable.external_type(), Some(ExternalType::Int32));
    let names: Vec<&str> = variable.dimensions().iter().map(|d| d.name()).collect();
    assert_eq!(names, vec!["LAT", "LON"]);

    let data = variable.into_typed::<i32>().expect("int view");
    assert_eq!(data.read_at(&[1, 1], &[2, 2]).expect("slice"), vec![6, 7, 11, 12]);
    assert_eq!(data.read().expect("all"), values);
    assert_eq!(
        data.read_strided(&[0, 0], &[2, 3], &[5, 2]).expect("strided"),
        vec![0, 2, 4, 25, 27, 29]
    );

    let title = root
        .get_attribute("TITLE")
        .expect("lookup")
        .expect("title present");
    assert_eq!(
        title.read_scalar::<String>().expect("read"),
        Some("My data set".to_string())
    );
}

#[test]
fn every_primitive_type_round_trips_as_attribute() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = create(dir.path().join("attrs.nc"), CreateOptions::new()).expect("create");

    roundtrip_attribute(&root, "i8", vec![i8::MIN, -1, 0, i8::MAX]);
    roundtrip_attribute(&root, "u8", vec![0u8, 200, u8::MAX]);
    roundtrip_attribute(&root, "i16", vec![i16::MIN, 0, i16::MAX]);
    roundtrip_attribute(&root, "u16", vec![0u16, u16::MAX]);
    roundtrip_attribute(&root, "i32", vec![i32::MIN, 7, i32::MAX]);
    roundtrip_attribute(&root, "u32", vec![0u32, u32::MAX]);
    roundtrip_attribute(&root, "i64", vec![i64::MIN, 3, i64::MAX]);
    roundtrip_attribute(&root, "u64", vec![0u64, u64::MAX]);
    roundtrip_attribute(&root, "isize", vec![isize::MIN, 0, isize::MAX]);
    roundtrip_attribute(&root, "usize", vec![0usize, usize::MAX]);
    roundtrip_attribute(&root, "f64", vec![-1.5f64, 0.0, 1e300]);
    roundtrip_attribute(
        &root,
        "strings",
        vec!["alpha".to_string(), String::new(), "γ".to_string()],
    );
}

#[test]
fn float_specials_keep_their_bit_patterns() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = create(dir.path().join("bits.nc"), CreateOptions::new()).expect("create");
    let values = vec![
        f32::from_bits(0x7fc0_0001),
        f32::INFINITY,
        f32::NEG_INFINITY,
        -0.0,
        1.5,
    ];
    let x = root.create_dimension("x", values.len()).expect("x");
    let variable = root.create_variable::<f32>("specials", &[x]).expect("var");
    variable.write(&values).expect("write");
    root.set_attribute_array("specials", &values).expect("attribute");

    let bits = |values: &[f32]| values.iter().map(|v| v.to_bits()).collect::<Vec<_>>();
    assert_eq!(bits(&variable.read().expect("read")), bits(&values));
    let attribute = root
        .get_attribute("specials")
        .expect("lookup")
        .expect("present");
    let stored = attribute.read::<f32>().expect("read").expect("readable");
    assert_eq!(bits(&stored), bits(&values));
}

#[test]
fn string_variables_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = create(dir.path().join("names.nc"), CreateOptions::new()).expect("create");
    let station = root.create_dimension("station", 3).expect("dim");
    let names = root
        .create_variable::<String>("station_name", &[station])
        .expect("var");
    let values = vec!["Zurich".to_string(), "Bern".to_string(), "Basel".to_string()];
    names.write(&values).expect("write");
    assert_eq!(names.read().expect("read"), values);
    assert_eq!(names.read_at(&[1], &[2]).expect("slice"), values[1..].to_vec());
}

#[test]
fn unlimited_growth_is_visible_after_refresh() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = create(dir.path().join("grow.nc"), CreateOptions::new()).expect("create");
    let x = root.create_dimension("x", 10).expect("x");
    let mut time = root.create_unlimited_dimension("time").expect("time");
    assert!(time.is_unlimited());
    let variable = root
        .create_variable::<f32>("series", &[x, time.clone()])
        .expect("variable");
    let mut variable = variable.into_inner();
    assert_eq!(variable.shape(), vec![10, 0]);

    let data = variable.as_typed::<f32>().expect("float view");
    let block: Vec<f32> = (0..1000).map(|i| i as f32).collect();
    data.write_at(&[0, 0], &[10, 100], &block).expect("first block");
    assert_eq!(variable.shape(), vec![10, 0]);
    assert_eq!(time.length(), 0);

    variable.refresh_dimensions().expect("refresh");
    assert_eq!(variable.shape(), vec![10, 100]);
    time.refresh().expect("refresh dim");
    assert_eq!(time.length(), 100);

    data.write_at(&[0, 100], &[10, 100], &block).expect("second block");
    variable.refresh_dimensions().expect("refresh");
    assert_eq!(variable.shape(), vec![10, 200]);

    let data = variable.as_typed::<f32>().expect("float view");
    let row = data.read_at(&[1, 98], &[1, 4]).expect("row");
    assert_eq!(row, vec![198.0, 199.0, 100.0, 101.0]);
}

#[test]
fn groups_nest_and_resolve_parents() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = create(dir.path().join("groups.nc"), CreateOptions::new()).expect("create");
    assert!(root.is_root());
    assert_eq!(root.name(), "/");
    let lat = root.create_dimension("lat", 4).expect("lat");

    let forecast = root.create_group("forecast").expect("group");
    let surface = forecast.create_group("surface").expect("nested");
    root.create_group("analysis").expect("sibling");

    let names: Vec<String> = root
        .get_groups()
        .expect("groups")
        .iter()
        .map(|g| g.name().to_string())
        .collect();
    assert_eq!(names, vec!["forecast", "analysis"]);

    let parent = surface.parent().expect("parent").expect("has parent");
    assert_eq!(parent.name(), "forecast");
    assert_eq!(parent.id(), forecast.id());
    assert!(root.parent().expect("root parent").is_none());

    let visible = surface
        .get_dimension("lat")
        .expect("lookup")
        .expect("inherited dimension");
    assert_eq!(visible.length(), 4);
    assert!(!visible.is_unlimited());
    assert!(surface.get_dimensions().expect("own dims").is_empty());

    let time = root.create_unlimited_dimension("time").expect("time");
    let inherited = surface
        .get_dimension("time")
        .expect("lookup")
        .expect("inherited unlimited dimension");
    assert!(inherited.is_unlimited());
    surface
        .create_variable::<i32>("steps", &[time])
        .expect("unlimited variable in subgroup");
    let steps = surface
        .get_variable("steps")
        .expect("lookup")
        .expect("present");
    assert!(steps.dimensions()[0].is_unlimited());

    let temp = surface
        .create_variable::<f64>("temperature", &[lat])
        .expect("variable in subgroup");
    temp.write(&[1.0, 2.0, 3.0, 4.0]).expect("write");
    let found = forecast
        .get_group("surface")
        .expect("lookup")
        .expect("present")
        .get_variable("temperature")
        .expect("lookup")
        .expect("present");
    assert_eq!(found.dimensions()[0].name(), "lat");

    let err = surface.close().expect_err("subgroup close");
    assert_eq!(err.kind(), ErrorKind::InvalidGroupHandle);
}

#[test]
fn missing_names_are_absent_not_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = create(dir.path().join("absent.nc"), CreateOptions::new()).expect("create");
    let x = root.create_dimension("x", 1).expect("x");
    let variable = root.create_variable::<i32>("v", &[x]).expect("var");

    assert!(root.get_variable("nope").expect("variable lookup").is_none());
    assert!(root.get_group("nope").expect("group lookup").is_none());
    assert!(root.get_attribute("nope").expect("attribute lookup").is_none());
    assert!(root.get_dimension("nope").expect("dimension lookup").is_none());
    assert!(variable.get_attribute("nope").expect("var attribute").is_none());
}

#[test]
fn memory_container_is_read_only() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("memory.nc");
    let root = create(&path, CreateOptions::new()).expect("create");
    let x = root.create_dimension("x", 3).expect("x");
    root.create_variable::<i16>("v", &[x])
        .expect("var")
        .write(&[1, 2, 3])
        .expect("write");
    root.close().expect("close");

    let bytes = std::fs::read(&path).expect("read file");
    let root = open_memory(bytes, "memory.nc").expect("open memory");
    let v = root
        .get_variable("v")
        .expect("lookup")
        .expect("present")
        .into_typed::<i16>()
        .expect("short view");
    assert_eq!(v.read().expect("read"), vec![1, 2, 3]);

    let err = v.write(&[4, 5, 6]).expect_err("read-only");
    assert_eq!(err.kind(), ErrorKind::NoPermission);
}

#[test]
fn engine_reports_version_and_types() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = create(dir.path().join("types.nc"), CreateOptions::new()).expect("create");
    assert!(!library_version().is_empty());

    let (name, size) = TypeId::from(ExternalType::Double)
        .inq_type(root.id())
        .expect("inq type");
    assert_eq!(name, "double");
    assert_eq!(size, 8);
}

#[test]
fn concurrent_containers_do_not_interfere() {
    let dir = tempfile::tempdir().expect("tempdir");
    let workers: Vec<_> = (0..6)
        .map(|worker| {
            let path = dir.path().join(format!("worker-{worker}.nc"));
            std::thread::spawn(move || {
                let root = create(&path, CreateOptions::new()).expect("create");
                let x = root.create_dimension("x", 64).expect("x");
                let v = root.create_variable::<i64>("v", &[x]).expect("var");
                let values: Vec<i64> = (0..64).map(|i| i * worker).collect();
                for chunk in 0..8 {
                    let start = chunk * 8;
                    v.write_at(&[start], &[8], &values[start..start + 8])
                        .expect("write");
                }
                assert_eq!(v.read().expect("read"), values);
                root.close().expect("close");
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker");
    }
}
