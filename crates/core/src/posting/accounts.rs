//! Chart-of-accounts tables used by the posting rules.

use super::error::PostingError;

/// A general-ledger account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Account {
    /// Account number.
    pub account_no: &'static str,
    /// Account title.
    pub title: &'static str,
}

impl Account {
    const fn new(account_no: &'static str, title: &'static str) -> Self {
        Self { account_no, title }
    }
}

/// Cash in bank.
pub const CASH_IN_BANK: Account = Account::new("101010100", "Cash in Bank");
/// Trade receivables.
pub const AR_TRADE: Account = Account::new("101020100", "AR-Trade Receivable");
/// Non-trade receivables (services).
pub const AR_NON_TRADE: Account = Account::new("101020500", "AR-Non Trade Receivable");
/// Bienes placements.
pub const SHORT_TERM_PLACEMENTS: Account = Account::new("101030100", "Short-term Placements");
/// Input VAT.
pub const INPUT_VAT: Account = Account::new("101060200", "Input VAT");
/// Creditable withholding tax withheld by customers.
pub const CREDITABLE_WITHHOLDING_TAX: Account =
    Account::new("101060400", "Creditable Withholding Tax");
/// Output VAT.
pub const OUTPUT_VAT: Account = Account::new("201030100", "Output VAT Payable");
/// Expanded withholding tax withheld from suppliers.
pub const EWT_PAYABLE: Account = Account::new("201030200", "Expanded Withholding Tax Payable");
/// Trade payables.
pub const AP_TRADE: Account = Account::new("202010100", "AP-Trade Payable");
/// Service revenue.
pub const SERVICE_INCOME: Account = Account::new("401020100", "Service Income");

/// Accounts a product posts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductAccounts {
    /// Product code.
    pub product_code: &'static str,
    /// Product name.
    pub name: &'static str,
    /// Sales revenue.
    pub sales: Account,
    /// Cost of goods sold.
    pub cogs: Account,
    /// Inventory.
    pub inventory: Account,
}

/// Product account lookup.
#[derive(Debug, Clone)]
pub struct AccountTable {
    products: Vec<ProductAccounts>,
}

impl Default for AccountTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl AccountTable {
    /// The standard fuel product table.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            products: vec![
                ProductAccounts {
                    product_code: "PET001",
                    name: "Biodiesel",
                    sales: Account::new("401010100", "Sales - Biodiesel"),
                    cogs: Account::new("501010100", "Cost of Goods Sold - Biodiesel"),
                    inventory: Account::new("101040100", "Inventory - Biodiesel"),
                },
                ProductAccounts {
                    product_code: "PET002",
                    name: "Econogas",
                    sales: Account::new("401010200", "Sales - Econogas"),
                    cogs: Account::new("501010200", "Cost of Goods Sold - Econogas"),
                    inventory: Account::new("101040200", "Inventory - Econogas"),
                },
                ProductAccounts {
                    product_code: "PET003",
                    name: "Envirogas",
                    sales: Account::new("401010300", "Sales - Envirogas"),
                    cogs: Account::new("501010300", "Cost of Goods Sold - Envirogas"),
                    inventory: Account::new("101040300", "Inventory - Envirogas"),
                },
            ],
        }
    }

    /// Adds or replaces a product.
    #[must_use]
    pub fn with_product(mut self, accounts: ProductAccounts) -> Self {
        self.products
            .retain(|p| p.product_code != accounts.product_code);
        self.products.push(accounts);
        self
    }

    /// Looks up a product's accounts.
    ///
    /// # Errors
    ///
    /// Returns `PostingError::UnknownProduct` for codes not in the table.
    pub fn product(&self, product_code: &str) -> Result<&ProductAccounts, PostingError> {
        self.products
            .iter()
            .find(|p| p.product_code.eq_ignore_ascii_case(product_code.trim()))
            .ok_or_else(|| PostingError::UnknownProduct(product_code.to_string()))
    }

    /// All known products.
    #[must_use]
    pub fn products(&self) -> &[ProductAccounts] {
        &self.products
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_products() {
        let table = AccountTable::standard();
        let pet001 = table.product("PET001").unwrap();
        assert_eq!(pet001.sales.account_no, "401010100");
        assert_eq!(pet001.cogs.account_no, "501010100");
        assert_eq!(pet001.inventory.account_no, "101040100");
        assert_eq!(table.product("pet002").unwrap().name, "Econogas");
    }

    #[test]
    fn test_unknown_product() {
        assert!(matches!(
            AccountTable::standard().product("PET999"),
            Err(PostingError::UnknownProduct(code)) if code == "PET999"
        ));
    }

    #[test]
    fn test_with_product_replaces() {
        let table = AccountTable::standard().with_product(ProductAccounts {
            product_code: "PET001",
            name: "Biodiesel B5",
            sales: Account::new("401010101", "Sales - B5"),
            cogs: Account::new("501010101", "COGS - B5"),
            inventory: Account::new("101040101", "Inventory - B5"),
        });
        assert_eq!(table.products().len(), 3);
        assert_eq!(table.product("PET001").unwrap().name, "Biodiesel B5");
    }
}
