//! Discovery integration tests
//!
//! Tree walking, metadata resolution and sequence grouping against real
//! directories.

use shotvault::ingest::{walk_sources, WorkUnit};
use shotvault::metadata::{CsvMetadataResolver, MetadataResolver, StaticMetadataResolver};
use shotvault_common::frames::check_continuity;
use shotvault_common::sequence::discover;
use shotvault_common::ShotTags;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"x").unwrap();
}

#[test]
fn test_discover_mixed_folder() {
    let tmp = tempdir().unwrap();
    for frame in 1001..=1005 {
        touch(&tmp.path().join(format!("take_{frame}.exr")));
    }
    touch(&tmp.path().join("single.exr"));
    touch(&tmp.path().join("take_01.exr"));
    fs::create_dir(tmp.path().join("nested_1001.exr")).unwrap();

    let found = discover(tmp.path(), &ShotTags::new("48", "0160", "4448x3096")).unwrap();

    assert_eq!(found.sequences.len(), 1);
    let seq = &found.sequences[0];
    assert_eq!(seq.base_name(), "take");
    assert_eq!(seq.padding(), 4);
    assert_eq!((seq.start_frame(), seq.end_frame()), (1001, 1005));
    assert!(!check_continuity(seq.frames()).has_gaps());

    // Different padding never joins a sequence; lone members become files.
    let names: Vec<String> = found
        .files
        .iter()
        .map(|f| f.path().file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["single.exr", "take_01.exr"]);
}

#[test]
fn test_walk_skips_unrelated_folders() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    touch(&root.join("SC_48/48_0160/4448x3096/take_1001.exr"));
    touch(&root.join("SC_48/48_0160/4448x3096/take_1002.exr"));
    touch(&root.join("SC_48/48_0160/notes/take_1001.exr"));
    touch(&root.join("SC_48/49_0010/4448x3096/take_1001.exr"));
    touch(&root.join("misc/SC_12/12_0010/1920x1080/bg.exr"));

    let walk = walk_sources(&[root.to_path_buf()], &[]);

    assert!(walk.errors.is_empty());
    assert_eq!(walk.units.len(), 2);
    match &walk.units[0] {
        WorkUnit::Sequence(seq) => {
            assert_eq!(seq.tags(), &ShotTags::new("48", "0160", "4448x3096"));
            assert_eq!(seq.len(), 2);
        }
        other => panic!("expected a sequence, got {other:?}"),
    }
    match &walk.units[1] {
        WorkUnit::File(file) => assert_eq!(file.tags().scene, "12"),
        other => panic!("expected a file, got {other:?}"),
    }
}

#[test]
fn test_csv_wins_over_config_table() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    touch(&root.join("SC_48/48_0160/4448x3096/take_1001.exr"));
    fs::write(
        root.join("SC_48/shots.csv"),
        "48/0160,GEN63_SC_48_SH_0160,main_plate_v002\n",
    )
    .unwrap();

    let mut table = BTreeMap::new();
    table.insert(
        "48/0160".to_string(),
        ["OTHER".to_string(), "main_plate_v001".to_string()],
    );
    table.insert(
        "48/0170".to_string(),
        ["GEN63_SC_48_SH_0170".to_string(), "bg_v001".to_string()],
    );
    let resolvers: Vec<Box<dyn MetadataResolver>> = vec![
        Box::new(CsvMetadataResolver::new()),
        Box::new(StaticMetadataResolver::from_table(&table)),
    ];

    let walk = walk_sources(&[root.to_path_buf()], &resolvers);

    let (_, entry) = walk.scene_shots.lookup("48", "0160").unwrap();
    assert_eq!(entry.scene_shot_id, "GEN63_SC_48_SH_0160");
    assert_eq!(entry.type_token, "main_plate_v002");
    assert!(walk.scene_shots.lookup("48", "0170").is_some());
}

#[test]
fn test_scene_folder_name_must_be_exact() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    touch(&root.join("SC_48_14/48_0160/4448x3096/take_1001.exr"));
    touch(&root.join("SC_48_14/48_0160/4448x3096/take_1002.exr"));
    touch(&root.join("SC_48_14/SC_12/12_0010/1920x1080/bg.exr"));

    let walk = walk_sources(&[root.to_path_buf()], &[]);

    // Only the properly named scene nested inside is picked up.
    assert_eq!(walk.units.len(), 1);
    match &walk.units[0] {
        WorkUnit::File(file) => assert_eq!(file.tags().scene, "12"),
        other => panic!("expected a file, got {other:?}"),
    }
}
