//! Embedded schema migrations.
//!
//! Tables are grouped per domain; column definitions stay aligned with the
//! entity models in `crate::entities`. Money columns are fixed-point
//! decimals, quantities integers, identifiers UUIDs.

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_vendor_tables::Migration),
            Box::new(m20240601_000002_create_stock_tables::Migration),
            Box::new(m20240601_000003_create_order_tables::Migration),
            Box::new(m20240601_000004_create_promotion_tables::Migration),
        ]
    }
}

mod m20240601_000001_create_vendor_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000001_create_vendor_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Vendors::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Vendors::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Vendors::Name).string().not_null())
                        .col(
                            ColumnDef::new(Vendors::CommissionRate)
                                .decimal_len(5, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Vendors::CommissionFixed)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Vendors::WalletBalance)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Vendors::PendingBalance)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Vendors::EscrowHoldDays).integer().null())
                        .col(
                            ColumnDef::new(Vendors::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Vendors::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Vendors::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(VendorTransactions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(VendorTransactions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(VendorTransactions::VendorId).uuid().not_null())
                        .col(ColumnDef::new(VendorTransactions::OrderId).uuid().null())
                        .col(
                            ColumnDef::new(VendorTransactions::TransactionType)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(VendorTransactions::Amount)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(VendorTransactions::BalanceBefore)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(VendorTransactions::BalanceAfter)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(VendorTransactions::Description).string().null())
                        .col(
                            ColumnDef::new(VendorTransactions::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_vendor_transactions_vendor_id")
                        .table(VendorTransactions::Table)
                        .col(VendorTransactions::VendorId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CategoryCommissions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CategoryCommissions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CategoryCommissions::VendorId).uuid().not_null())
                        .col(ColumnDef::new(CategoryCommissions::CategoryId).uuid().not_null())
                        .col(
                            ColumnDef::new(CategoryCommissions::CommissionRate)
                                .decimal_len(5, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CategoryCommissions::CommissionFixed)
                                .decimal_len(12, 2)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(CategoryCommissions::Priority)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(CategoryCommissions::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(CategoryCommissions::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CategoryCommissions::UpdatedAt)
                                .timestamp()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_category_commissions_vendor_category")
                        .table(CategoryCommissions::Table)
                        .col(CategoryCommissions::VendorId)
                        .col(CategoryCommissions::CategoryId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CategoryCommissions::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(VendorTransactions::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Vendors::Table).to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Vendors {
        Table,
        Id,
        Name,
        CommissionRate,
        CommissionFixed,
        WalletBalance,
        PendingBalance,
        EscrowHoldDays,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum VendorTransactions {
        Table,
        Id,
        VendorId,
        OrderId,
        TransactionType,
        Amount,
        BalanceBefore,
        BalanceAfter,
        Description,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum CategoryCommissions {
        Table,
        Id,
        VendorId,
        CategoryId,
        CommissionRate,
        CommissionFixed,
        Priority,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000002_create_stock_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000002_create_stock_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockRecords::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockRecords::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockRecords::ProductId).uuid().not_null())
                        .col(ColumnDef::new(StockRecords::VariantId).uuid().null())
                        .col(ColumnDef::new(StockRecords::WarehouseId).uuid().not_null())
                        .col(
                            ColumnDef::new(StockRecords::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockRecords::Reserved)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockRecords::ReorderPoint)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockRecords::MinQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(StockRecords::MaxQuantity).integer().null())
                        .col(
                            ColumnDef::new(StockRecords::AverageCost)
                                .decimal_len(12, 2)
                                .null(),
                        )
                        .col(ColumnDef::new(StockRecords::LastRestockedAt).timestamp().null())
                        .col(ColumnDef::new(StockRecords::LastSoldAt).timestamp().null())
                        .col(ColumnDef::new(StockRecords::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(StockRecords::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_records_product_variant_warehouse")
                        .table(StockRecords::Table)
                        .col(StockRecords::ProductId)
                        .col(StockRecords::VariantId)
                        .col(StockRecords::WarehouseId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_records_warehouse_id")
                        .table(StockRecords::Table)
                        .col(StockRecords::WarehouseId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockMovements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockMovements::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::StockRecordId).uuid().not_null())
                        .col(ColumnDef::new(StockMovements::OrderId).uuid().null())
                        .col(ColumnDef::new(StockMovements::MovementType).string().not_null())
                        .col(ColumnDef::new(StockMovements::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(StockMovements::QuantityBefore)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::QuantityAfter)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::UnitCost)
                                .decimal_len(12, 2)
                                .null(),
                        )
                        .col(ColumnDef::new(StockMovements::ReferenceType).string().null())
                        .col(ColumnDef::new(StockMovements::ReferenceNumber).string().null())
                        .col(ColumnDef::new(StockMovements::Reason).string().null())
                        .col(ColumnDef::new(StockMovements::ActorId).uuid().null())
                        .col(ColumnDef::new(StockMovements::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_movements_stock_record_id")
                        .table(StockMovements::Table)
                        .col(StockMovements::StockRecordId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_movements_order_id")
                        .table(StockMovements::Table)
                        .col(StockMovements::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockReservations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockReservations::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockReservations::OrderId).uuid().not_null())
                        .col(
                            ColumnDef::new(StockReservations::StockRecordId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockReservations::Quantity).integer().not_null())
                        .col(ColumnDef::new(StockReservations::Status).string().not_null())
                        .col(
                            ColumnDef::new(StockReservations::ExpiresAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockReservations::ReleaseReason).string().null())
                        .col(
                            ColumnDef::new(StockReservations::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockReservations::ReleasedAt).timestamp().null())
                        .col(ColumnDef::new(StockReservations::FulfilledAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_reservations_order_id")
                        .table(StockReservations::Table)
                        .col(StockReservations::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_reservations_status_expires_at")
                        .table(StockReservations::Table)
                        .col(StockReservations::Status)
                        .col(StockReservations::ExpiresAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockTransfers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockTransfers::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransfers::TransferNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(StockTransfers::FromWarehouseId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockTransfers::ToWarehouseId).uuid().not_null())
                        .col(ColumnDef::new(StockTransfers::Status).string().not_null())
                        .col(ColumnDef::new(StockTransfers::RequestedBy).uuid().null())
                        .col(ColumnDef::new(StockTransfers::Notes).string().null())
                        .col(ColumnDef::new(StockTransfers::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(StockTransfers::UpdatedAt).timestamp().null())
                        .col(ColumnDef::new(StockTransfers::ShippedAt).timestamp().null())
                        .col(ColumnDef::new(StockTransfers::CompletedAt).timestamp().null())
                        .col(ColumnDef::new(StockTransfers::CancelledAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockTransferItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockTransferItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransferItems::TransferId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockTransferItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(StockTransferItems::VariantId).uuid().null())
                        .col(
                            ColumnDef::new(StockTransferItems::RequestedQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransferItems::TransferredQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(StockTransferItems::Notes).string().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_transfer_items_transfer_id")
                        .table(StockTransferItems::Table)
                        .col(StockTransferItems::TransferId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockAudits::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockAudits::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAudits::AuditNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(StockAudits::WarehouseId).uuid().not_null())
                        .col(ColumnDef::new(StockAudits::Status).string().not_null())
                        .col(ColumnDef::new(StockAudits::AuditType).string().not_null())
                        .col(ColumnDef::new(StockAudits::PerformedBy).uuid().null())
                        .col(ColumnDef::new(StockAudits::Notes).string().null())
                        .col(ColumnDef::new(StockAudits::StartedAt).timestamp().not_null())
                        .col(ColumnDef::new(StockAudits::CompletedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockAuditItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockAuditItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockAuditItems::AuditId).uuid().not_null())
                        .col(
                            ColumnDef::new(StockAuditItems::StockRecordId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAuditItems::SystemQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAuditItems::CountedQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockAuditItems::Notes).string().null())
                        .col(ColumnDef::new(StockAuditItems::CountedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_audit_items_audit_id")
                        .table(StockAuditItems::Table)
                        .col(StockAuditItems::AuditId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            for table in [
                TableDropStatement::new().table(StockAuditItems::Table).to_owned(),
                TableDropStatement::new().table(StockAudits::Table).to_owned(),
                TableDropStatement::new().table(StockTransferItems::Table).to_owned(),
                TableDropStatement::new().table(StockTransfers::Table).to_owned(),
                TableDropStatement::new().table(StockReservations::Table).to_owned(),
                TableDropStatement::new().table(StockMovements::Table).to_owned(),
                TableDropStatement::new().table(StockRecords::Table).to_owned(),
            ] {
                manager.drop_table(table).await?;
            }
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum StockRecords {
        Table,
        Id,
        ProductId,
        VariantId,
        WarehouseId,
        Quantity,
        Reserved,
        ReorderPoint,
        MinQuantity,
        MaxQuantity,
        AverageCost,
        LastRestockedAt,
        LastSoldAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum StockMovements {
        Table,
        Id,
        StockRecordId,
        OrderId,
        MovementType,
        Quantity,
        QuantityBefore,
        QuantityAfter,
        UnitCost,
        ReferenceType,
        ReferenceNumber,
        Reason,
        ActorId,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum StockReservations {
        Table,
        Id,
        OrderId,
        StockRecordId,
        Quantity,
        Status,
        ExpiresAt,
        ReleaseReason,
        CreatedAt,
        ReleasedAt,
        FulfilledAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum StockTransfers {
        Table,
        Id,
        TransferNumber,
        FromWarehouseId,
        ToWarehouseId,
        Status,
        RequestedBy,
        Notes,
        CreatedAt,
        UpdatedAt,
        ShippedAt,
        CompletedAt,
        CancelledAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum StockTransferItems {
        Table,
        Id,
        TransferId,
        ProductId,
        VariantId,
        RequestedQuantity,
        TransferredQuantity,
        Notes,
    }

    #[derive(DeriveIden)]
    pub(super) enum StockAudits {
        Table,
        Id,
        AuditNumber,
        WarehouseId,
        Status,
        AuditType,
        PerformedBy,
        Notes,
        StartedAt,
        CompletedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum StockAuditItems {
        Table,
        Id,
        AuditId,
        StockRecordId,
        SystemQuantity,
        CountedQuantity,
        Notes,
        CountedAt,
    }
}

mod m20240601_000003_create_order_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000003_create_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Orders::OrderNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Orders::UserId).uuid().null())
                        .col(ColumnDef::new(Orders::VendorId).uuid().not_null())
                        .col(ColumnDef::new(Orders::Status).string().not_null())
                        .col(ColumnDef::new(Orders::CustomerEmail).string().null())
                        .col(ColumnDef::new(Orders::CustomerPhone).string().null())
                        .col(ColumnDef::new(Orders::CustomerName).string().null())
                        .col(ColumnDef::new(Orders::Subtotal).decimal_len(12, 2).not_null())
                        .col(
                            ColumnDef::new(Orders::DiscountAmount)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::TaxAmount)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::DeliveryFee)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::TotalAmount)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Orders::CommissionRate).decimal_len(5, 2).null())
                        .col(
                            ColumnDef::new(Orders::CommissionFixed)
                                .decimal_len(12, 2)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Orders::CommissionAmount)
                                .decimal_len(12, 2)
                                .null(),
                        )
                        .col(ColumnDef::new(Orders::VendorPayout).decimal_len(12, 2).null())
                        .col(ColumnDef::new(Orders::PromoCode).string().null())
                        .col(ColumnDef::new(Orders::CustomerSegment).string().null())
                        .col(ColumnDef::new(Orders::CancellationReason).string().null())
                        .col(ColumnDef::new(Orders::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Orders::UpdatedAt).timestamp().null())
                        .col(ColumnDef::new(Orders::ConfirmedAt).timestamp().null())
                        .col(ColumnDef::new(Orders::ProcessingAt).timestamp().null())
                        .col(ColumnDef::new(Orders::ShippedAt).timestamp().null())
                        .col(ColumnDef::new(Orders::DeliveredAt).timestamp().null())
                        .col(ColumnDef::new(Orders::CancelledAt).timestamp().null())
                        .col(ColumnDef::new(Orders::CompletedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_vendor_id")
                        .table(Orders::Table)
                        .col(Orders::VendorId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_status")
                        .table(Orders::Table)
                        .col(Orders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(OrderItems::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ProductId).uuid().null())
                        .col(ColumnDef::new(OrderItems::VariantId).uuid().null())
                        .col(ColumnDef::new(OrderItems::ProductName).string().not_null())
                        .col(ColumnDef::new(OrderItems::ProductSku).string().null())
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(OrderItems::UnitPrice)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::TotalPrice)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::DiscountAmount)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(OrderItems::TaxAmount)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(OrderItems::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_items_order_id")
                        .table(OrderItems::Table)
                        .col(OrderItems::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderStatusHistory::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderStatusHistory::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderStatusHistory::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderStatusHistory::FromStatus).string().null())
                        .col(ColumnDef::new(OrderStatusHistory::ToStatus).string().not_null())
                        .col(ColumnDef::new(OrderStatusHistory::Comment).string().null())
                        .col(ColumnDef::new(OrderStatusHistory::ActorId).uuid().null())
                        .col(
                            ColumnDef::new(OrderStatusHistory::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_status_history_order_id")
                        .table(OrderStatusHistory::Table)
                        .col(OrderStatusHistory::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderPayments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderPayments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderPayments::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderPayments::Method).string().null())
                        .col(ColumnDef::new(OrderPayments::Status).string().not_null())
                        .col(
                            ColumnDef::new(OrderPayments::Amount)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderPayments::Currency).string().not_null())
                        .col(ColumnDef::new(OrderPayments::ProviderTxnId).string().null())
                        .col(ColumnDef::new(OrderPayments::ErrorMessage).string().null())
                        .col(
                            ColumnDef::new(OrderPayments::IsEscrow)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(OrderPayments::EscrowHoldDays)
                                .integer()
                                .not_null()
                                .default(7),
                        )
                        .col(
                            ColumnDef::new(OrderPayments::EscrowReleasedAt)
                                .timestamp()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(OrderPayments::EscrowReleaseAmount)
                                .decimal_len(12, 2)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(OrderPayments::RefundableAmount)
                                .decimal_len(12, 2)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(OrderPayments::RefundedAmount)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(OrderPayments::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(OrderPayments::UpdatedAt).timestamp().null())
                        .col(ColumnDef::new(OrderPayments::ProcessedAt).timestamp().null())
                        .col(ColumnDef::new(OrderPayments::FailedAt).timestamp().null())
                        .col(ColumnDef::new(OrderPayments::RefundedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_payments_order_id")
                        .table(OrderPayments::Table)
                        .col(OrderPayments::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_payments_status")
                        .table(OrderPayments::Table)
                        .col(OrderPayments::Status)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            for table in [
                TableDropStatement::new().table(OrderPayments::Table).to_owned(),
                TableDropStatement::new().table(OrderStatusHistory::Table).to_owned(),
                TableDropStatement::new().table(OrderItems::Table).to_owned(),
                TableDropStatement::new().table(Orders::Table).to_owned(),
            ] {
                manager.drop_table(table).await?;
            }
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Orders {
        Table,
        Id,
        OrderNumber,
        UserId,
        VendorId,
        Status,
        CustomerEmail,
        CustomerPhone,
        CustomerName,
        Subtotal,
        DiscountAmount,
        TaxAmount,
        DeliveryFee,
        TotalAmount,
        CommissionRate,
        CommissionFixed,
        CommissionAmount,
        VendorPayout,
        PromoCode,
        CustomerSegment,
        CancellationReason,
        CreatedAt,
        UpdatedAt,
        ConfirmedAt,
        ProcessingAt,
        ShippedAt,
        DeliveredAt,
        CancelledAt,
        CompletedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum OrderItems {
        Table,
        Id,
        OrderId,
        ProductId,
        VariantId,
        ProductName,
        ProductSku,
        Quantity,
        UnitPrice,
        TotalPrice,
        DiscountAmount,
        TaxAmount,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum OrderStatusHistory {
        Table,
        Id,
        OrderId,
        FromStatus,
        ToStatus,
        Comment,
        ActorId,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum OrderPayments {
        Table,
        Id,
        OrderId,
        Method,
        Status,
        Amount,
        Currency,
        ProviderTxnId,
        ErrorMessage,
        IsEscrow,
        EscrowHoldDays,
        EscrowReleasedAt,
        EscrowReleaseAmount,
        RefundableAmount,
        RefundedAmount,
        CreatedAt,
        UpdatedAt,
        ProcessedAt,
        FailedAt,
        RefundedAt,
    }
}

mod m20240601_000004_create_promotion_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000004_create_promotion_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PromoCodes::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(PromoCodes::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(PromoCodes::VendorId).uuid().null())
                        .col(
                            ColumnDef::new(PromoCodes::Code)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(PromoCodes::DiscountType).string().not_null())
                        .col(
                            ColumnDef::new(PromoCodes::DiscountValue)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PromoCodes::MaxDiscountAmount)
                                .decimal_len(12, 2)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PromoCodes::MinOrderAmount)
                                .decimal_len(12, 2)
                                .null(),
                        )
                        .col(ColumnDef::new(PromoCodes::MinItemsCount).integer().null())
                        .col(ColumnDef::new(PromoCodes::ApplicableCategories).json().null())
                        .col(ColumnDef::new(PromoCodes::ApplicableProducts).json().null())
                        .col(ColumnDef::new(PromoCodes::ApplicableVendors).json().null())
                        .col(ColumnDef::new(PromoCodes::ApplicableSegments).json().null())
                        .col(ColumnDef::new(PromoCodes::UsageLimit).integer().null())
                        .col(ColumnDef::new(PromoCodes::UsageLimitPerUser).integer().null())
                        .col(
                            ColumnDef::new(PromoCodes::CurrentUsageCount)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(PromoCodes::CanStackWithOtherPromos)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(PromoCodes::CanStackWithSales)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(PromoCodes::StartDate).timestamp().not_null())
                        .col(ColumnDef::new(PromoCodes::EndDate).timestamp().null())
                        .col(
                            ColumnDef::new(PromoCodes::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(PromoCodes::Priority)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(PromoCodes::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(PromoCodes::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PromoCodeUsage::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PromoCodeUsage::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PromoCodeUsage::PromoCodeId).uuid().not_null())
                        .col(ColumnDef::new(PromoCodeUsage::UserId).uuid().null())
                        .col(ColumnDef::new(PromoCodeUsage::OrderId).uuid().null())
                        .col(
                            ColumnDef::new(PromoCodeUsage::DiscountAmount)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PromoCodeUsage::OrderAmount)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(PromoCodeUsage::UsedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_promo_code_usage_code_user")
                        .table(PromoCodeUsage::Table)
                        .col(PromoCodeUsage::PromoCodeId)
                        .col(PromoCodeUsage::UserId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(FlashSales::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(FlashSales::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(FlashSales::VendorId).uuid().null())
                        .col(ColumnDef::new(FlashSales::Name).string().not_null())
                        .col(
                            ColumnDef::new(FlashSales::Slug)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(FlashSales::DiscountType).string().not_null())
                        .col(
                            ColumnDef::new(FlashSales::DiscountValue)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(FlashSales::MaxDiscountAmount)
                                .decimal_len(12, 2)
                                .null(),
                        )
                        .col(ColumnDef::new(FlashSales::StartDate).timestamp().not_null())
                        .col(ColumnDef::new(FlashSales::EndDate).timestamp().not_null())
                        .col(ColumnDef::new(FlashSales::TotalQuantityLimit).integer().null())
                        .col(
                            ColumnDef::new(FlashSales::CurrentSoldCount)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(FlashSales::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(FlashSales::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(FlashSales::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(FlashSaleProducts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(FlashSaleProducts::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(FlashSaleProducts::FlashSaleId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(FlashSaleProducts::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(FlashSaleProducts::DiscountValue)
                                .decimal_len(12, 2)
                                .null(),
                        )
                        .col(ColumnDef::new(FlashSaleProducts::QuantityLimit).integer().null())
                        .col(
                            ColumnDef::new(FlashSaleProducts::SoldCount)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(FlashSaleProducts::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_flash_sale_products_sale_product")
                        .table(FlashSaleProducts::Table)
                        .col(FlashSaleProducts::FlashSaleId)
                        .col(FlashSaleProducts::ProductId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(BulkDiscounts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(BulkDiscounts::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(BulkDiscounts::ProductId).uuid().null())
                        .col(ColumnDef::new(BulkDiscounts::CategoryId).uuid().null())
                        .col(ColumnDef::new(BulkDiscounts::VendorId).uuid().null())
                        .col(ColumnDef::new(BulkDiscounts::Name).string().null())
                        .col(ColumnDef::new(BulkDiscounts::Tiers).json().not_null())
                        .col(ColumnDef::new(BulkDiscounts::ApplicableSegments).json().null())
                        .col(
                            ColumnDef::new(BulkDiscounts::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(BulkDiscounts::StartDate).timestamp().null())
                        .col(ColumnDef::new(BulkDiscounts::EndDate).timestamp().null())
                        .col(ColumnDef::new(BulkDiscounts::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(BulkDiscounts::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            for table in [
                TableDropStatement::new().table(BulkDiscounts::Table).to_owned(),
                TableDropStatement::new().table(FlashSaleProducts::Table).to_owned(),
                TableDropStatement::new().table(FlashSales::Table).to_owned(),
                TableDropStatement::new().table(PromoCodeUsage::Table).to_owned(),
                TableDropStatement::new().table(PromoCodes::Table).to_owned(),
            ] {
                manager.drop_table(table).await?;
            }
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum PromoCodes {
        Table,
        Id,
        VendorId,
        Code,
        DiscountType,
        DiscountValue,
        MaxDiscountAmount,
        MinOrderAmount,
        MinItemsCount,
        ApplicableCategories,
        ApplicableProducts,
        ApplicableVendors,
        ApplicableSegments,
        UsageLimit,
        UsageLimitPerUser,
        CurrentUsageCount,
        CanStackWithOtherPromos,
        CanStackWithSales,
        StartDate,
        EndDate,
        IsActive,
        Priority,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum PromoCodeUsage {
        Table,
        Id,
        PromoCodeId,
        UserId,
        OrderId,
        DiscountAmount,
        OrderAmount,
        UsedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum FlashSales {
        Table,
        Id,
        VendorId,
        Name,
        Slug,
        DiscountType,
        DiscountValue,
        MaxDiscountAmount,
        StartDate,
        EndDate,
        TotalQuantityLimit,
        CurrentSoldCount,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum FlashSaleProducts {
        Table,
        Id,
        FlashSaleId,
        ProductId,
        DiscountValue,
        QuantityLimit,
        SoldCount,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum BulkDiscounts {
        Table,
        Id,
        ProductId,
        CategoryId,
        VendorId,
        Name,
        Tiers,
        ApplicableSegments,
        IsActive,
        StartDate,
        EndDate,
        CreatedAt,
        UpdatedAt,
    }
}
