use erdflow::{
    Column, ColumnField, ConnectionError, DiagramStore, Entity, Notification, RelationshipKind, StoreError,
};
use pretty_assertions::assert_eq;

/// `user(id) -> order(no) -> order_item(line)` with nothing connected yet.
fn shop() -> DiagramStore {
    let mut store = DiagramStore::new();
    store
        .add_entity(Entity::new("user", "user").with_column(Column::new("id", "id", "INT").primary_key()))
        .unwrap();
    store
        .add_entity(Entity::new("order", "order").with_column(Column::new("no", "no", "INT").primary_key()))
        .unwrap();
    store
        .add_entity(Entity::new("order_item", "order_item").with_column(Column::new("line", "line", "INT").primary_key()))
        .unwrap();
    store
}

/// `shop()` with both relationships identifying.
fn connected_shop() -> DiagramStore {
    let mut store = shop();
    store.connect("user", "order", RelationshipKind::OneToManyIdentifying).unwrap();
    store
        .connect("order", "order_item", RelationshipKind::OneToManyIdentifying)
        .unwrap();
    store
}

fn column<'a>(store: &'a DiagramStore, entity: &str, name: &str) -> Option<&'a Column> {
    store.graph().entity(entity).and_then(|e| e.column_named(name))
}

fn fk_count(store: &DiagramStore, child: &str, parent: &str) -> usize {
    store
        .graph()
        .entity(child)
        .map_or(0, |e| e.fk_columns_from(parent).count())
}

#[test]
fn test_connect_identifying_creates_key_column() {
    let mut store = shop();
    store.connect("user", "order", RelationshipKind::OneToManyIdentifying).unwrap();

    let user_id = column(&store, "order", "user_id").unwrap();
    assert_eq!(user_id.data_type, "INT");
    assert!(user_id.pk && user_id.is_fk() && user_id.nn);
    let fk = user_id.foreign_key().unwrap();
    assert_eq!(fk.parent_entity_id, "user");
    assert_eq!(fk.parent_column_id, "id");
}

#[test]
fn test_deleting_parent_key_cascades_down_the_chain() {
    let mut store = connected_shop();
    assert!(column(&store, "order_item", "order_user_id").is_some());

    store.remove_column("user", "id").unwrap();

    assert!(column(&store, "order", "user_id").is_none());
    assert!(column(&store, "order_item", "order_user_id").is_none());
    assert!(store.graph().find_relationship("user", "order").is_none());
    // order_item still carries order.no, so that relationship survives.
    assert!(store.graph().find_relationship("order", "order_item").is_some());
    assert_eq!(fk_count(&store, "order_item", "order"), 1);
}

#[test]
fn test_deleting_only_derived_key_drops_downstream_relationship() {
    let mut store = DiagramStore::new();
    store
        .add_entity(Entity::new("user", "user").with_column(Column::new("id", "id", "INT").primary_key()))
        .unwrap();
    store.add_entity(Entity::new("order", "order")).unwrap();
    store
        .add_entity(Entity::new("order_item", "order_item"))
        .unwrap();
    store.connect("user", "order", RelationshipKind::OneToManyIdentifying).unwrap();
    store
        .connect("order", "order_item", RelationshipKind::OneToManyIdentifying)
        .unwrap();
    assert_eq!(fk_count(&store, "order_item", "order"), 1);

    store.remove_column("user", "id").unwrap();

    assert!(store.graph().relationships.is_empty());
    assert_eq!(fk_count(&store, "order_item", "order"), 0);
}

#[test]
fn test_reconnect_demotes_and_undo_restores() {
    let mut store = connected_shop();
    let before = store.graph().clone();
    let rel = store.graph().find_relationship("user", "order").unwrap().id.clone();

    store
        .reconnect(&rel, RelationshipKind::OneToManyNonIdentifying)
        .unwrap();

    let user_id = column(&store, "order", "user_id").unwrap();
    assert!(!user_id.pk && !user_id.nn);
    assert!(column(&store, "order_item", "order_user_id").is_none());
    assert!(column(&store, "order_item", "order_no").is_some());
    assert!(store.graph().find_relationship("order", "order_item").is_some());

    assert_eq!(store.undo(), Some(&before));
    assert!(column(&store, "order", "user_id").unwrap().pk);
}

#[test]
fn test_opposite_connection_rejected_without_side_effects() {
    let mut store = connected_shop();
    let before = store.to_document_json().unwrap();
    let history = store.history().len();

    for kind in [
        RelationshipKind::OneToManyNonIdentifying,
        RelationshipKind::OneToOneIdentifying,
    ] {
        let err = store.connect("order", "user", kind).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Connection(ConnectionError::CyclicRelationship { .. })
        ));
    }

    assert_eq!(store.to_document_json().unwrap(), before);
    assert_eq!(store.history().len(), history);
}

#[test]
fn test_identifying_self_relationship_rejected() {
    let mut store = shop();
    let before = store.graph().clone();
    let err = store
        .connect("user", "user", RelationshipKind::OneToManyIdentifying)
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Connection(ConnectionError::InvalidSelfIdentifying(_))
    ));
    assert_eq!(store.graph(), &before);

    // The non-identifying variant is a plain self reference.
    store
        .connect("user", "user", RelationshipKind::OneToManyNonIdentifying)
        .unwrap();
    assert!(!column(&store, "user", "user_id").unwrap().pk);
}

#[test]
fn test_data_type_reaches_every_transitive_copy() {
    let mut store = connected_shop();
    store
        .set_column_field("user", "id", ColumnField::DataType("BIGINT".to_string()))
        .unwrap();

    assert_eq!(column(&store, "user", "id").unwrap().data_type, "BIGINT");
    assert_eq!(column(&store, "order", "user_id").unwrap().data_type, "BIGINT");
    assert_eq!(column(&store, "order_item", "order_user_id").unwrap().data_type, "BIGINT");
    assert_eq!(column(&store, "order_item", "order_no").unwrap().data_type, "INT");
}

#[test]
fn test_disconnect_removes_every_fk_from_parent() {
    let mut store = connected_shop();
    let rel = store.graph().find_relationship("order", "order_item").unwrap().id.clone();
    store.disconnect(&rel).unwrap();

    assert_eq!(fk_count(&store, "order_item", "order"), 0);
    assert_eq!(store.graph().entity("order_item").unwrap().columns.len(), 1);
}

#[test]
fn test_connect_then_disconnect_is_identity() {
    let mut store = shop();
    store
        .add_column("user", Column::new("tenant", "tenant", "INT").primary_key())
        .unwrap();
    let before = store.to_document_json().unwrap();

    let rel = store
        .connect("user", "order", RelationshipKind::OneToOneIdentifying)
        .unwrap()
        .id
        .unwrap();
    assert_eq!(fk_count(&store, "order", "user"), 2);
    store.disconnect(&rel).unwrap();

    assert_eq!(store.to_document_json().unwrap(), before);
}

#[test]
fn test_undo_redo_inverse_law() {
    let mut store = shop();
    let mut states = vec![store.to_document_json().unwrap()];

    store.connect("user", "order", RelationshipKind::OneToManyIdentifying).unwrap();
    states.push(store.to_document_json().unwrap());
    store
        .add_column("user", Column::new("", "email", "TEXT"))
        .unwrap();
    states.push(store.to_document_json().unwrap());
    store
        .set_column_field("user", "id", ColumnField::Name("uid".to_string()))
        .unwrap();
    states.push(store.to_document_json().unwrap());
    store.hide_entity("order").unwrap();
    states.push(store.to_document_json().unwrap());

    for expected in states.iter().rev().skip(1) {
        assert!(store.undo().is_some());
        assert_eq!(&store.to_document_json().unwrap(), expected);
    }
    for expected in states.iter().skip(1) {
        assert!(store.redo().is_some());
        assert_eq!(&store.to_document_json().unwrap(), expected);
    }
    assert_eq!(store.redo(), None);
}

#[test]
fn test_composite_group_toggle_leaves_other_children_alone() {
    let mut store = DiagramStore::new();
    store
        .add_entity(
            Entity::new("account", "account")
                .with_column(Column::new("region", "region", "TEXT").primary_key())
                .with_column(Column::new("num", "num", "INT").primary_key()),
        )
        .unwrap();
    store.add_entity(Entity::new("invoice", "invoice")).unwrap();
    store.add_entity(Entity::new("contact", "contact")).unwrap();
    store
        .connect("account", "invoice", RelationshipKind::OneToManyIdentifying)
        .unwrap();
    store
        .connect("account", "contact", RelationshipKind::OneToManyIdentifying)
        .unwrap();

    let invoice = store.graph().entity("invoice").unwrap();
    let groups: Vec<_> = invoice
        .fk_columns_from("account")
        .map(|c| c.foreign_key().unwrap().relationship_group_id.clone())
        .collect();
    assert_eq!(groups.len(), 2);
    assert!(groups[0].is_some());
    assert_eq!(groups[0], groups[1]);

    let region = column(&store, "invoice", "account_region").unwrap().id.clone();
    store
        .set_column_field("invoice", &region, ColumnField::Pk(false))
        .unwrap();

    let invoice = store.graph().entity("invoice").unwrap();
    assert!(invoice.fk_columns_from("account").all(|c| !c.pk));
    let contact = store.graph().entity("contact").unwrap();
    assert!(contact.fk_columns_from("account").all(|c| c.pk));
    assert_eq!(
        store.graph().find_relationship("account", "invoice").unwrap().kind,
        RelationshipKind::OneToManyNonIdentifying
    );
    assert_eq!(
        store.graph().find_relationship("account", "contact").unwrap().kind,
        RelationshipKind::OneToManyIdentifying
    );
}

#[test]
fn test_new_key_column_propagates_through_identifying_chain() {
    let mut store = connected_shop();
    let applied = store
        .add_column("user", Column::new("", "tenant", "INT").primary_key())
        .unwrap();

    assert!(column(&store, "order", "user_tenant").unwrap().pk);
    assert!(column(&store, "order_item", "order_user_tenant").unwrap().pk);
    assert!(applied
        .notifications
        .iter()
        .any(|n| matches!(n, Notification::ForeignKeyAdded { .. })));
}

#[test]
fn test_rename_updates_generated_names_only() {
    let mut store = connected_shop();
    let no = column(&store, "order_item", "order_no").unwrap().id.clone();
    store
        .set_column_field("order_item", &no, ColumnField::Name("ref_no".to_string()))
        .unwrap();

    store
        .set_column_field("user", "id", ColumnField::Name("uid".to_string()))
        .unwrap();
    store
        .set_column_field("order", "no", ColumnField::Name("number".to_string()))
        .unwrap();

    assert!(column(&store, "order", "user_uid").is_some());
    assert!(column(&store, "order_item", "order_user_uid").is_some());
    assert!(column(&store, "order_item", "ref_no").is_some());
    assert!(column(&store, "order_item", "order_number").is_none());
}

#[test]
fn test_document_round_trip_through_store() {
    let mut store = connected_shop();
    store.set_node_color("user", Some(serde_json::json!("#ffcc00"))).unwrap();
    let json = store.to_document_json().unwrap();

    let mut loaded = DiagramStore::new();
    loaded.load_document(&json).unwrap();
    assert_eq!(loaded.to_document_json().unwrap(), json);
    assert!(!loaded.can_undo());
}

/// `a -> b -> d`, `a -> c -> d`, `d -> e`, all identifying, each entity with its own `id` key.
fn diamond() -> DiagramStore {
    let mut store = DiagramStore::new();
    for name in ["a", "b", "c", "d", "e"] {
        store
            .add_entity(Entity::new(name, name).with_column(Column::new(format!("{}_id", name), "id", "INT").primary_key()))
            .unwrap();
    }
    for (source, target) in [("a", "b"), ("a", "c"), ("b", "d"), ("c", "d"), ("d", "e")] {
        store
            .connect(source, target, RelationshipKind::OneToManyIdentifying)
            .unwrap();
    }
    store
}

fn column_names(store: &DiagramStore, entity: &str) -> Vec<String> {
    store
        .graph()
        .entity(entity)
        .unwrap()
        .columns
        .iter()
        .map(|c| c.name.clone())
        .collect()
}

/// FK columns whose parent column is gone, is no longer a key, or whose relationship is missing.
fn dangling(store: &DiagramStore) -> Vec<String> {
    let graph = store.graph();
    let mut found = Vec::new();
    for entity in &graph.entities {
        for column in &entity.columns {
            let Some(fk) = column.foreign_key() else {
                continue;
            };
            let resolves = graph
                .entity(&fk.parent_entity_id)
                .and_then(|parent| parent.column(&fk.parent_column_id))
                .is_some_and(|parent_column| parent_column.pk);
            let related = graph.find_relationship(&fk.parent_entity_id, &entity.id).is_some();
            if !resolves || !related {
                found.push(format!("{}.{}", entity.id, column.name));
            }
        }
    }
    found
}

#[test]
fn test_diamond_key_addition_reaches_every_path() {
    let mut store = diamond();
    assert_eq!(
        column_names(&store, "e"),
        vec!["id", "d_id", "d_b_id", "d_b_a_id", "d_c_id", "d_c_a_id"]
    );

    store
        .add_column("a", Column::new("a_x", "x", "INT").primary_key())
        .unwrap();

    assert!(column(&store, "d", "b_a_x").unwrap().pk);
    assert!(column(&store, "d", "c_a_x").unwrap().pk);
    assert!(column(&store, "e", "d_b_a_x").unwrap().pk);
    assert!(column(&store, "e", "d_c_a_x").unwrap().pk);
    assert_eq!(dangling(&store), Vec::<String>::new());
}

#[test]
fn test_diamond_key_deletion_leaves_no_dangling_fk() {
    let mut store = diamond();
    store.remove_column("a", "a_id").unwrap();

    assert_eq!(column_names(&store, "d"), vec!["id", "b_id", "c_id"]);
    assert_eq!(column_names(&store, "e"), vec!["id", "d_id", "d_b_id", "d_c_id"]);
    assert!(store.graph().find_relationship("a", "b").is_none());
    assert!(store.graph().find_relationship("a", "c").is_none());
    assert_eq!(dangling(&store), Vec::<String>::new());
}

#[test]
fn test_diamond_demotion_leaves_no_dangling_fk() {
    let mut store = diamond();
    let rel = store.graph().find_relationship("a", "c").unwrap().id.clone();
    store
        .reconnect(&rel, RelationshipKind::OneToManyNonIdentifying)
        .unwrap();

    assert!(!column(&store, "c", "a_id").unwrap().pk);
    assert!(column(&store, "d", "c_a_id").is_none());
    assert!(column(&store, "e", "d_c_a_id").is_none());
    assert!(column(&store, "e", "d_b_a_id").is_some());
    assert_eq!(dangling(&store), Vec::<String>::new());
}

#[test]
fn test_diamond_data_type_reaches_every_path() {
    let mut store = diamond();
    store
        .set_column_field("a", "a_id", ColumnField::DataType("BIGINT".to_string()))
        .unwrap();

    for (entity, name) in [("b", "a_id"), ("c", "a_id"), ("d", "b_a_id"), ("d", "c_a_id"), ("e", "d_b_a_id"), ("e", "d_c_a_id")] {
        assert_eq!(column(&store, entity, name).unwrap().data_type, "BIGINT", "{}.{}", entity, name);
    }
    assert_eq!(column(&store, "e", "d_b_id").unwrap().data_type, "INT");
}
