use serde::{Deserialize, Serialize};

/// Coarse authorization class. The policy table is keyed by this.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionClass {
    /// List/retrieve.
    Read,
    /// Create/update products, record stock movements.
    Write,
    /// Warehouse and category maintenance, product deletion.
    Manage,
    /// Transfers and orders.
    Logistics,
    /// Inventory counts and manual notifications.
    Reconcile,
    /// Aggregate reporting.
    Analytics,
    /// Destructive deletes, audit log, user and role management.
    AdminOnly,
    /// Anything scoped to the caller's own data (their notification inbox).
    SelfService,
}

/// Concrete operation a caller asks for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ViewCatalog,
    ViewStock,
    ViewLowStock,

    CreateProduct,
    UpdateProduct,
    RecordMovement,

    DeleteProduct,
    CreateWarehouse,
    UpdateWarehouse,
    CreateCategory,
    UpdateCategory,

    ViewTransfers,
    CreateTransfer,
    ViewOrders,
    CreateOrder,
    UpdateOrder,

    ViewInventoryCounts,
    CreateInventoryCount,
    UpdateInventoryCount,
    SendNotification,

    ViewAnalytics,

    DeleteWarehouse,
    DeleteCategory,
    ReverseTransfer,
    DeleteOrder,
    DeleteInventoryCount,
    ViewAuditLog,
    ManageUsers,
    AssignRole,

    ViewOwnNotifications,
    MarkNotificationRead,
}

impl Action {
    pub fn class(&self) -> ActionClass {
        use Action::*;
        match self {
            ViewCatalog | ViewStock | ViewLowStock => ActionClass::Read,
            CreateProduct | UpdateProduct | RecordMovement => ActionClass::Write,
            DeleteProduct | CreateWarehouse | UpdateWarehouse | CreateCategory | UpdateCategory => {
                ActionClass::Manage
            }
            ViewTransfers | CreateTransfer | ViewOrders | CreateOrder | UpdateOrder => {
                ActionClass::Logistics
            }
            ViewInventoryCounts | CreateInventoryCount | UpdateInventoryCount | SendNotification => {
                ActionClass::Reconcile
            }
            ViewAnalytics => ActionClass::Analytics,
            DeleteWarehouse | DeleteCategory | ReverseTransfer | DeleteOrder
            | DeleteInventoryCount | ViewAuditLog | ManageUsers | AssignRole => {
                ActionClass::AdminOnly
            }
            ViewOwnNotifications | MarkNotificationRead => ActionClass::SelfService,
        }
    }

    pub fn as_str(&self) -> &'static str {
        use Action::*;
        match self {
            ViewCatalog => "view_catalog",
            ViewStock => "view_stock",
            ViewLowStock => "view_low_stock",
            CreateProduct => "create_product",
            UpdateProduct => "update_product",
            RecordMovement => "record_movement",
            DeleteProduct => "delete_product",
            CreateWarehouse => "create_warehouse",
            UpdateWarehouse => "update_warehouse",
            CreateCategory => "create_category",
            UpdateCategory => "update_category",
            ViewTransfers => "view_transfers",
            CreateTransfer => "create_transfer",
            ViewOrders => "view_orders",
            CreateOrder => "create_order",
            UpdateOrder => "update_order",
            ViewInventoryCounts => "view_inventory_counts",
            CreateInventoryCount => "create_inventory_count",
            UpdateInventoryCount => "update_inventory_count",
            SendNotification => "send_notification",
            ViewAnalytics => "view_analytics",
            DeleteWarehouse => "delete_warehouse",
            DeleteCategory => "delete_category",
            ReverseTransfer => "reverse_transfer",
            DeleteOrder => "delete_order",
            DeleteInventoryCount => "delete_inventory_count",
            ViewAuditLog => "view_audit_log",
            ManageUsers => "manage_users",
            AssignRole => "assign_role",
            ViewOwnNotifications => "view_own_notifications",
            MarkNotificationRead => "mark_notification_read",
        }
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
