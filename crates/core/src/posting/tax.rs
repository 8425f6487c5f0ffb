//! VAT and withholding tax.
//!
//! Vatable amounts are VAT-inclusive at 12%. Withholding applies to the
//! net-of-VAT amount: 1% for goods, 2% for services.

use rust_decimal::Decimal;
use tally_shared::types::round_money;

use crate::document::VatTreatment;

/// VAT rate.
pub const VAT_RATE: Decimal = Decimal::from_parts(12, 0, 0, false, 2);

/// Net and VAT parts of a gross amount. `net + vat == gross` exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VatSplit {
    /// Gross amount.
    pub gross: Decimal,
    /// Amount net of VAT.
    pub net: Decimal,
    /// VAT.
    pub vat: Decimal,
}

/// Splits a VAT-inclusive gross amount.
#[must_use]
pub fn split_vat(gross: Decimal, treatment: VatTreatment) -> VatSplit {
    let gross = round_money(gross);
    match treatment {
        VatTreatment::Vatable => {
            let net = round_money(gross / (Decimal::ONE + VAT_RATE));
            VatSplit {
                gross,
                net,
                vat: gross - net,
            }
        }
        VatTreatment::Exempt | VatTreatment::ZeroRated => VatSplit {
            gross,
            net: gross,
            vat: Decimal::ZERO,
        },
    }
}

/// What was sold, for the withholding rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithholdingKind {
    /// Goods: 1%.
    Goods,
    /// Services: 2%.
    Services,
}

impl WithholdingKind {
    /// Withholding rate.
    #[must_use]
    pub const fn rate(self) -> Decimal {
        match self {
            Self::Goods => Decimal::from_parts(1, 0, 0, false, 2),
            Self::Services => Decimal::from_parts(2, 0, 0, false, 2),
        }
    }
}

/// Withholding tax on a net amount.
#[must_use]
pub fn withholding_tax(net: Decimal, kind: WithholdingKind) -> Decimal {
    round_money(net * kind.rate())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(56000), dec!(50000), dec!(6000))]
    #[case(dec!(1120), dec!(1000), dec!(120))]
    #[case(dec!(100), dec!(89.2857), dec!(10.7143))]
    fn test_split_vatable(#[case] gross: Decimal, #[case] net: Decimal, #[case] vat: Decimal) {
        let split = split_vat(gross, VatTreatment::Vatable);
        assert_eq!(split.net, net);
        assert_eq!(split.vat, vat);
    }

    #[test]
    fn test_exempt_has_no_vat() {
        let split = split_vat(dec!(50000), VatTreatment::Exempt);
        assert_eq!(split.net, dec!(50000));
        assert_eq!(split.vat, Decimal::ZERO);
    }

    #[test]
    fn test_withholding_rates() {
        assert_eq!(withholding_tax(dec!(50000), WithholdingKind::Goods), dec!(500));
        assert_eq!(withholding_tax(dec!(50000), WithholdingKind::Services), dec!(1000));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Net plus VAT always reconstructs the gross amount.
        #[test]
        fn prop_split_is_exact(units in 1i64..100_000_000_000i64) {
            let gross = Decimal::new(units, 4);
            let split = split_vat(gross, VatTreatment::Vatable);
            prop_assert_eq!(split.net + split.vat, gross);
            prop_assert!(split.vat >= Decimal::ZERO);
        }
    }
}
