//! Posting engine schema.
//!
//! Creates the document, numbering, ledger, period, cost-layer, balance and
//! audit tables plus the guard trigger that keeps the ledger append-only.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: DOCUMENTS & NUMBERING
        // ============================================================
        db.execute_unprepared(DOCUMENTS_SQL).await?;
        db.execute_unprepared(DOCUMENT_SEQUENCES_SQL).await?;

        // ============================================================
        // PART 2: LEDGER
        // ============================================================
        db.execute_unprepared(LEDGER_LINES_SQL).await?;

        // ============================================================
        // PART 3: PERIODS & BALANCES
        // ============================================================
        db.execute_unprepared(POSTED_PERIODS_SQL).await?;
        db.execute_unprepared(BALANCES_SQL).await?;

        // ============================================================
        // PART 4: INVENTORY COSTING
        // ============================================================
        db.execute_unprepared(COST_LAYERS_SQL).await?;

        // ============================================================
        // PART 5: AUDIT
        // ============================================================
        db.execute_unprepared(AUDIT_TRAILS_SQL).await?;

        // ============================================================
        // PART 6: TRIGGERS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const DOCUMENTS_SQL: &str = r"
CREATE TABLE documents (
    id UUID PRIMARY KEY,
    company_id VARCHAR(16) NOT NULL,
    document_type VARCHAR(32) NOT NULL,
    document_no VARCHAR(32),
    transaction_date DATE NOT NULL,
    status VARCHAR(16) NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'posted', 'voided', 'canceled')),
    body JSONB NOT NULL,
    amount_paid NUMERIC(18, 4) NOT NULL DEFAULT 0 CHECK (amount_paid >= 0),
    created_by UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    posted_by UUID,
    posted_at TIMESTAMPTZ,
    voided_by UUID,
    voided_at TIMESTAMPTZ,
    canceled_by UUID,
    canceled_at TIMESTAMPTZ,

    CONSTRAINT documents_company_type_no_key UNIQUE (company_id, document_type, document_no),
    CONSTRAINT documents_posted_stamped CHECK (
        status NOT IN ('posted', 'voided') OR (posted_by IS NOT NULL AND posted_at IS NOT NULL)
    )
);

CREATE INDEX idx_documents_company_date ON documents(company_id, transaction_date);
CREATE INDEX idx_documents_company_status ON documents(company_id, document_type, status);
";

const DOCUMENT_SEQUENCES_SQL: &str = r"
CREATE TABLE document_sequences (
    company_id VARCHAR(16) NOT NULL,
    document_type VARCHAR(32) NOT NULL,
    last_number VARCHAR(32),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    PRIMARY KEY (company_id, document_type)
);
";

const LEDGER_LINES_SQL: &str = r"
CREATE TABLE ledger_lines (
    id UUID PRIMARY KEY,
    company_id VARCHAR(16) NOT NULL,
    line_date DATE NOT NULL,
    account_no VARCHAR(16) NOT NULL,
    account_title VARCHAR(128) NOT NULL,
    debit NUMERIC(18, 4) NOT NULL DEFAULT 0 CHECK (debit >= 0),
    credit NUMERIC(18, 4) NOT NULL DEFAULT 0 CHECK (credit >= 0),
    reference_document_id UUID NOT NULL REFERENCES documents(id),
    reference_no VARCHAR(64) NOT NULL,
    document_type VARCHAR(32) NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    sub_account_type VARCHAR(16),
    sub_account_id VARCHAR(64),
    sub_account_name VARCHAR(128),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT ledger_lines_one_sided CHECK (debit = 0 OR credit = 0),
    CONSTRAINT ledger_lines_sub_account_complete CHECK (
        (sub_account_type IS NULL) = (sub_account_id IS NULL)
    )
);

CREATE INDEX idx_ledger_lines_document ON ledger_lines(reference_document_id);
CREATE INDEX idx_ledger_lines_account_date ON ledger_lines(company_id, account_no, line_date);
";

const POSTED_PERIODS_SQL: &str = r"
CREATE TABLE posted_periods (
    company_id VARCHAR(16) NOT NULL,
    module VARCHAR(8) NOT NULL CHECK (module IN ('AP', 'AR', 'GL', 'INV')),
    fiscal_year INTEGER NOT NULL,
    fiscal_month INTEGER NOT NULL CHECK (fiscal_month BETWEEN 1 AND 12),
    is_posted BOOLEAN NOT NULL DEFAULT false,
    posted_by UUID,
    posted_at TIMESTAMPTZ,

    PRIMARY KEY (company_id, module, fiscal_year, fiscal_month)
);
";

const BALANCES_SQL: &str = r"
CREATE TABLE account_period_balances (
    company_id VARCHAR(16) NOT NULL,
    account_no VARCHAR(16) NOT NULL,
    fiscal_year INTEGER NOT NULL,
    fiscal_month INTEGER NOT NULL CHECK (fiscal_month BETWEEN 1 AND 12),
    account_title VARCHAR(128) NOT NULL,
    normal_balance VARCHAR(8) NOT NULL CHECK (normal_balance IN ('debit', 'credit')),
    beginning_balance NUMERIC(18, 4) NOT NULL DEFAULT 0,
    debit_total NUMERIC(18, 4) NOT NULL DEFAULT 0,
    credit_total NUMERIC(18, 4) NOT NULL DEFAULT 0,
    ending_balance NUMERIC(18, 4) NOT NULL DEFAULT 0,
    is_closed BOOLEAN NOT NULL DEFAULT false,

    PRIMARY KEY (company_id, account_no, fiscal_year, fiscal_month)
);

CREATE TABLE sub_account_period_balances (
    company_id VARCHAR(16) NOT NULL,
    account_no VARCHAR(16) NOT NULL,
    sub_account_type VARCHAR(16) NOT NULL,
    sub_account_id VARCHAR(64) NOT NULL,
    fiscal_year INTEGER NOT NULL,
    fiscal_month INTEGER NOT NULL CHECK (fiscal_month BETWEEN 1 AND 12),
    sub_account_name VARCHAR(128) NOT NULL,
    account_title VARCHAR(128) NOT NULL,
    normal_balance VARCHAR(8) NOT NULL CHECK (normal_balance IN ('debit', 'credit')),
    beginning_balance NUMERIC(18, 4) NOT NULL DEFAULT 0,
    debit_total NUMERIC(18, 4) NOT NULL DEFAULT 0,
    credit_total NUMERIC(18, 4) NOT NULL DEFAULT 0,
    ending_balance NUMERIC(18, 4) NOT NULL DEFAULT 0,
    is_closed BOOLEAN NOT NULL DEFAULT false,

    PRIMARY KEY (company_id, account_no, sub_account_type, sub_account_id, fiscal_year, fiscal_month)
);
";

const COST_LAYERS_SQL: &str = r"
CREATE TABLE cost_layers (
    id UUID PRIMARY KEY,
    company_id VARCHAR(16) NOT NULL,
    product_code VARCHAR(32) NOT NULL,
    entry_date DATE NOT NULL,
    sequence BIGINT NOT NULL,
    movement_kind VARCHAR(16) NOT NULL CHECK (movement_kind IN ('purchase', 'sale')),
    quantity NUMERIC(18, 4) NOT NULL CHECK (quantity > 0),
    purchase_cost NUMERIC(18, 4),
    source_document_id UUID NOT NULL REFERENCES documents(id),
    is_voided BOOLEAN NOT NULL DEFAULT false,
    unit_cost NUMERIC(18, 4) NOT NULL DEFAULT 0,
    total NUMERIC(18, 4) NOT NULL DEFAULT 0,
    running_balance NUMERIC(18, 4) NOT NULL DEFAULT 0,
    running_total NUMERIC(18, 4) NOT NULL DEFAULT 0,
    running_average_cost NUMERIC(18, 4) NOT NULL DEFAULT 0,
    needs_review BOOLEAN NOT NULL DEFAULT false,

    CONSTRAINT cost_layers_chain_order_key UNIQUE (company_id, product_code, sequence),
    CONSTRAINT cost_layers_purchase_cost CHECK (
        (movement_kind = 'purchase') = (purchase_cost IS NOT NULL)
    )
);

CREATE INDEX idx_cost_layers_chain ON cost_layers(company_id, product_code, entry_date, sequence);
CREATE INDEX idx_cost_layers_source ON cost_layers(source_document_id);
";

const AUDIT_TRAILS_SQL: &str = r"
CREATE TABLE audit_trails (
    id UUID PRIMARY KEY,
    company_id VARCHAR(16) NOT NULL,
    user_id UUID NOT NULL,
    activity TEXT NOT NULL,
    document_type VARCHAR(32),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX idx_audit_trails_company_time ON audit_trails(company_id, created_at);
";

const TRIGGERS_SQL: &str = r"
-- Ledger lines are append-only. Corrections are new lines.
CREATE OR REPLACE FUNCTION reject_ledger_line_change()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'ledger_lines is append-only (% on %)', TG_OP, OLD.id;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_ledger_lines_append_only
    BEFORE UPDATE OR DELETE ON ledger_lines
    FOR EACH ROW EXECUTE FUNCTION reject_ledger_line_change();

-- Period close flags only ever go from open to closed.
CREATE OR REPLACE FUNCTION reject_period_reopen()
RETURNS TRIGGER AS $$
BEGIN
    IF OLD.is_posted AND NOT NEW.is_posted THEN
        RAISE EXCEPTION 'period %-% of % is closed for %',
            OLD.fiscal_year, OLD.fiscal_month, OLD.company_id, OLD.module;
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_posted_periods_one_way
    BEFORE UPDATE ON posted_periods
    FOR EACH ROW EXECUTE FUNCTION reject_period_reopen();
";

const DROP_ALL_SQL: &str = r"
DROP TRIGGER IF EXISTS trg_posted_periods_one_way ON posted_periods;
DROP TRIGGER IF EXISTS trg_ledger_lines_append_only ON ledger_lines;
DROP FUNCTION IF EXISTS reject_period_reopen();
DROP FUNCTION IF EXISTS reject_ledger_line_change();
DROP TABLE IF EXISTS audit_trails;
DROP TABLE IF EXISTS cost_layers;
DROP TABLE IF EXISTS sub_account_period_balances;
DROP TABLE IF EXISTS account_period_balances;
DROP TABLE IF EXISTS posted_periods;
DROP TABLE IF EXISTS ledger_lines;
DROP TABLE IF EXISTS document_sequences;
DROP TABLE IF EXISTS documents;
";
