use super::*;

fn parsed(src: &str) -> (Mapping, Option<Shape>) {
    let Value::Mapping(root) = serde_yaml::from_str(src).unwrap() else {
        panic!("recipe must be a mapping");
    };
    (root, scan(src).unwrap())
}

#[test]
fn alias_repeats_the_anchored_shape() {
    let (_, shape) = parsed("intro: &i {file: a.mkv}\nall: [*i, b.mkv]\n");
    let Some(Shape::Map(0, entries)) = shape else {
        panic!("expected a root mapping");
    };
    let Shape::Map(intro, _) = &entries[1] else {
        panic!("expected anchored mapping");
    };
    let Shape::Seq(0, items) = &entries[3] else {
        panic!("expected sequence");
    };
    assert_ne!(*intro, 0);
    assert_eq!(items[0].anchor(), *intro);
    assert_eq!(items[1], Shape::Leaf(0));
}

#[test]
fn table_labels_anchor_and_every_alias() {
    let (root, shape) = parsed("intro: &i {file: a.mkv}\nall: [*i, b.mkv, *i]\n");
    let table = table(&root, shape.as_ref());
    let intro = &root["intro"];
    let Value::Sequence(all) = &root["all"] else {
        panic!("expected sequence");
    };
    let id = table[&std::ptr::from_ref(intro)];
    assert_eq!(table[&std::ptr::from_ref(&all[0])], id);
    assert_eq!(table[&std::ptr::from_ref(&all[2])], id);
    assert!(!table.contains_key(&std::ptr::from_ref(&all[1])));
    assert_eq!(table.len(), 3);
}

#[test]
fn anchored_scalar_inside_alias_is_labelled_too() {
    let (root, shape) = parsed("a: &clip {file: &f a.mkv}\nb: *clip\nc: *f\n");
    let table = table(&root, shape.as_ref());
    let file_a = &root["a"]["file"];
    let file_b = &root["b"]["file"];
    assert_eq!(
        table[&std::ptr::from_ref(file_a)],
        table[&std::ptr::from_ref(&root["c"])]
    );
    assert_eq!(
        table[&std::ptr::from_ref(file_a)],
        table[&std::ptr::from_ref(file_b)]
    );
}

#[test]
fn document_without_anchors_has_empty_table() {
    let (root, shape) = parsed("all: [a.mkv, b.mkv]\n");
    assert!(table(&root, shape.as_ref()).is_empty());
}

#[test]
fn malformed_yaml_is_reported() {
    assert!(scan("all: [a.mkv").is_err());
}

#[test]
fn empty_document_has_no_shape() {
    assert_eq!(scan("").unwrap(), None);
}
