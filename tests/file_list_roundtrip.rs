use proptest::prelude::*;
use std::path::{Path, PathBuf};

use lamco_dnd_session::clipboard::{FileAttributes, FileKind, FileList};

fn component() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_ .-]{1,12}".prop_filter("dot components are collapsed", |s| {
        s != "." && s != ".."
    })
}

fn relative_path() -> impl Strategy<Value = String> {
    prop::collection::vec(component(), 1..4).prop_map(|parts| parts.join("/"))
}

fn attributes() -> impl Strategy<Value = FileAttributes> {
    (
        prop::bool::ANY,
        prop::option::of(0u32..0o7777),
        prop::option::of(0u64..1 << 40),
        prop::option::of(any::<i64>()),
        prop::option::of(any::<i64>()),
        prop::option::of(any::<i64>()),
        prop::option::of(any::<i64>()),
    )
        .prop_map(|(dir, permissions, size, created, accessed, written, changed)| FileAttributes {
            kind: if dir {
                FileKind::Directory
            } else {
                FileKind::Regular
            },
            permissions,
            size: if dir { None } else { size },
            created,
            accessed,
            written,
            changed,
        })
}

proptest! {
    #[test]
    fn built_list_survives_encoding(
        entries in prop::collection::vec((relative_path(), attributes()), 0..12),
        local in prop::bool::ANY,
    ) {
        let mut list = FileList::new();
        for (path, attrs) in &entries {
            list.add_file(path, None).unwrap();
            list.add_file_attributes(*attrs).unwrap();
        }

        let decoded = FileList::from_bytes(&list.to_bytes(local).unwrap()).unwrap();

        prop_assert!(decoded.is_received());
        prop_assert_eq!(decoded.relative_paths(), list.relative_paths());
        prop_assert_eq!(decoded.total_size(), list.total_size());
        for (got, (_, want)) in decoded.entries().iter().zip(&entries) {
            prop_assert_eq!(got.attributes, *want);
            prop_assert_eq!(got.attributes.mask(), want.mask());
        }
    }

    #[test]
    fn received_bytes_reencode_identically(
        names in prop::collection::vec(component(), 1..6),
        local in prop::bool::ANY,
    ) {
        let mut list = FileList::new();
        for name in &names {
            let full = PathBuf::from("/home/user/Desktop").join(name);
            list.add_file(name, Some(&full)).unwrap();
            list.add_file_attributes(FileAttributes::regular(7)).unwrap();
        }

        let wire = list.to_bytes(local).unwrap();
        let decoded = FileList::from_bytes(&wire).unwrap();
        prop_assert_eq!(decoded.to_bytes(local).unwrap(), wire);
    }

    #[test]
    fn decoder_never_panics(data in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = FileList::from_bytes(&data);
    }
}

#[test]
fn test_directory_precedes_contents() {
    let mut list = FileList::new();
    list.add_file("a/", Some(Path::new("/home/user/a"))).unwrap();
    list.add_file_attributes(FileAttributes::directory()).unwrap();
    list.add_file("a/b.txt", Some(Path::new("/home/user/a/b.txt"))).unwrap();
    list.add_file_attributes(FileAttributes::regular(5)).unwrap();

    let decoded = FileList::from_bytes(&list.to_bytes(false).unwrap()).unwrap();
    assert_eq!(decoded.relative_paths(), vec!["a", "a/b.txt"]);
    assert_eq!(decoded.entries()[0].attributes.kind, FileKind::Directory);
    assert_eq!(decoded.total_size(), 5);
    assert_eq!(decoded.uri_list(), vec!["file:///home/user/a".to_string()]);
}
