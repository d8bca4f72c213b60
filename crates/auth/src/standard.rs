//! Built-in catalog: the workspace object hierarchy, its operations and the
//! seeded default roles.
//!
//! Products with their own hierarchy can ignore this module and register
//! scope types and operations directly on the builder.

use permscope_core::ScopeTypeName;

use crate::operations::Operation;
use crate::roles::Role;

pub mod scope {
    pub const INSTANCE: &str = "instance";
    pub const GROUP: &str = "group";
    pub const APPLICATION: &str = "application";
    pub const DATABASE_TABLE: &str = "database_table";
    pub const DATABASE_ROW: &str = "database_row";
    pub const DATABASE_VIEW: &str = "database_view";
}

pub mod op {
    pub const GROUP_READ: &str = "group.read";
    pub const GROUP_UPDATE: &str = "group.update";
    pub const GROUP_DELETE: &str = "group.delete";
    pub const GROUP_ASSIGN_ROLE: &str = "group.assign_role";
    pub const GROUP_LIST_APPLICATIONS: &str = "group.list_applications";
    pub const GROUP_CREATE_APPLICATION: &str = "group.create_application";

    pub const APPLICATION_READ: &str = "application.read";
    pub const APPLICATION_UPDATE: &str = "application.update";
    pub const APPLICATION_DELETE: &str = "application.delete";

    pub const DATABASE_LIST_TABLES: &str = "database.list_tables";
    pub const DATABASE_CREATE_TABLE: &str = "database.create_table";

    pub const TABLE_READ: &str = "database.table.read";
    pub const TABLE_UPDATE: &str = "database.table.update";
    pub const TABLE_DELETE: &str = "database.table.delete";
    pub const TABLE_LIST_ROWS: &str = "database.table.list_rows";
    pub const TABLE_CREATE_ROW: &str = "database.table.create_row";
    pub const TABLE_LIST_VIEWS: &str = "database.table.list_views";

    pub const ROW_READ: &str = "database.row.read";
    pub const ROW_UPDATE: &str = "database.row.update";
    pub const ROW_DELETE: &str = "database.row.delete";

    pub const VIEW_READ: &str = "database.view.read";
    pub const VIEW_UPDATE: &str = "database.view.update";
}

pub mod role {
    pub const ADMIN: &str = "ADMIN";
    pub const BUILDER: &str = "BUILDER";
    pub const EDITOR: &str = "EDITOR";
    pub const COMMENTER: &str = "COMMENTER";
    pub const VIEWER: &str = "VIEWER";
    pub const NO_ACCESS: &str = "NO_ACCESS";
    pub const NO_ROLE_LOW_PRIORITY: &str = "NO_ROLE_LOW_PRIORITY";
}

/// Scope types as `(name, parent)`, parents listed before children.
pub fn scope_hierarchy() -> Vec<(ScopeTypeName, Option<ScopeTypeName>)> {
    use scope::*;

    vec![
        (INSTANCE.into(), None),
        (GROUP.into(), Some(INSTANCE.into())),
        (APPLICATION.into(), Some(GROUP.into())),
        (DATABASE_TABLE.into(), Some(APPLICATION.into())),
        (DATABASE_ROW.into(), Some(DATABASE_TABLE.into())),
        (DATABASE_VIEW.into(), Some(DATABASE_TABLE.into())),
    ]
}

pub fn operations() -> Vec<Operation> {
    use op::*;
    use scope::*;

    vec![
        Operation::new(GROUP_READ, GROUP),
        Operation::new(GROUP_UPDATE, GROUP),
        Operation::new(GROUP_DELETE, GROUP),
        Operation::new(GROUP_ASSIGN_ROLE, GROUP),
        Operation::new(GROUP_LIST_APPLICATIONS, GROUP).with_object_scope(APPLICATION),
        Operation::new(GROUP_CREATE_APPLICATION, GROUP),
        Operation::new(APPLICATION_READ, APPLICATION),
        Operation::new(APPLICATION_UPDATE, APPLICATION),
        Operation::new(APPLICATION_DELETE, APPLICATION),
        Operation::new(DATABASE_LIST_TABLES, APPLICATION).with_object_scope(DATABASE_TABLE),
        Operation::new(DATABASE_CREATE_TABLE, APPLICATION),
        Operation::new(TABLE_READ, DATABASE_TABLE),
        Operation::new(TABLE_UPDATE, DATABASE_TABLE),
        Operation::new(TABLE_DELETE, DATABASE_TABLE),
        Operation::new(TABLE_LIST_ROWS, DATABASE_TABLE).with_object_scope(DATABASE_ROW),
        Operation::new(TABLE_CREATE_ROW, DATABASE_TABLE),
        Operation::new(TABLE_LIST_VIEWS, DATABASE_TABLE).with_object_scope(DATABASE_VIEW),
        Operation::new(ROW_READ, DATABASE_ROW),
        Operation::new(ROW_UPDATE, DATABASE_ROW),
        Operation::new(ROW_DELETE, DATABASE_ROW),
        Operation::new(VIEW_READ, DATABASE_VIEW),
        Operation::new(VIEW_UPDATE, DATABASE_VIEW),
    ]
}

const READ_OPERATIONS: &[&str] = &[
    op::GROUP_READ,
    op::GROUP_LIST_APPLICATIONS,
    op::APPLICATION_READ,
    op::DATABASE_LIST_TABLES,
    op::TABLE_READ,
    op::TABLE_LIST_ROWS,
    op::TABLE_LIST_VIEWS,
    op::ROW_READ,
    op::VIEW_READ,
];

const ROW_WRITE_OPERATIONS: &[&str] = &[op::TABLE_CREATE_ROW, op::ROW_UPDATE, op::ROW_DELETE];

const BUILD_OPERATIONS: &[&str] = &[
    op::GROUP_CREATE_APPLICATION,
    op::APPLICATION_UPDATE,
    op::APPLICATION_DELETE,
    op::DATABASE_CREATE_TABLE,
    op::TABLE_UPDATE,
    op::TABLE_DELETE,
    op::VIEW_UPDATE,
];

const GROUP_ADMIN_OPERATIONS: &[&str] =
    &[op::GROUP_UPDATE, op::GROUP_DELETE, op::GROUP_ASSIGN_ROLE];

/// Roles seeded at startup, all flagged as defaults.
pub fn default_roles() -> Vec<Role> {
    let reads = READ_OPERATIONS.iter().copied();
    let row_writes = ROW_WRITE_OPERATIONS.iter().copied();
    let builds = BUILD_OPERATIONS.iter().copied();
    let admin = GROUP_ADMIN_OPERATIONS.iter().copied();

    vec![
        Role::new(role::ADMIN, "Admin")
            .with_operations(
                reads
                    .clone()
                    .chain(row_writes.clone())
                    .chain(builds.clone())
                    .chain(admin),
            )
            .as_default(),
        Role::new(role::BUILDER, "Builder")
            .with_operations(reads.clone().chain(row_writes.clone()).chain(builds))
            .as_default(),
        Role::new(role::EDITOR, "Editor")
            .with_operations(reads.clone().chain(row_writes))
            .as_default(),
        Role::new(role::COMMENTER, "Commenter")
            .with_operations(reads.clone())
            .as_default(),
        Role::new(role::VIEWER, "Viewer").with_operations(reads).as_default(),
        Role::new(role::NO_ACCESS, "No access").as_default(),
        Role::new(role::NO_ROLE_LOW_PRIORITY, "No role").as_default(),
    ]
}
