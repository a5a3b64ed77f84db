//! Order-level adjustments (credits, discounts, fees, taxes).
//!
//! Each line may carry one adjustment sub-object. The order's adjustment is
//! the field-wise sum over its lines, where a missing component counts as 0.

use serde::{Deserialize, Serialize};

use acqorders_core::ValueObject;

/// Adjustment figures of one line (or the total of many).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insurance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overhead: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipment: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax1: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax2: Option<f64>,
}

impl ValueObject for Adjustment {}

/// Null-safe addition: absent + absent = 0, absent + x = x, x + y = x + y.
fn accumulate(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (None, None) => Some(0.0),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (Some(a), Some(b)) => Some(a + b),
    }
}

impl Adjustment {
    /// Field-wise null-safe sum of `self` and `other`, as a new value.
    pub fn combine(&self, other: &Adjustment) -> Adjustment {
        Adjustment {
            credit: accumulate(self.credit, other.credit),
            discount: accumulate(self.discount, other.discount),
            insurance: accumulate(self.insurance, other.insurance),
            overhead: accumulate(self.overhead, other.overhead),
            shipment: accumulate(self.shipment, other.shipment),
            tax1: accumulate(self.tax1, other.tax1),
            tax2: accumulate(self.tax2, other.tax2),
        }
    }

    /// Components in declaration order, absent ones read as 0.
    pub fn components_or_zero(&self) -> [f64; 7] {
        [
            self.credit,
            self.discount,
            self.insurance,
            self.overhead,
            self.shipment,
            self.tax1,
            self.tax2,
        ]
        .map(|c| c.unwrap_or(0.0))
    }
}

impl core::ops::Add for Adjustment {
    type Output = Adjustment;

    fn add(self, rhs: Adjustment) -> Adjustment {
        self.combine(&rhs)
    }
}

/// Anything that may carry an adjustment ("line-like").
pub trait AdjustmentSource {
    fn adjustment(&self) -> Option<Adjustment>;
}

impl AdjustmentSource for Adjustment {
    fn adjustment(&self) -> Option<Adjustment> {
        Some(*self)
    }
}

impl AdjustmentSource for Option<Adjustment> {
    fn adjustment(&self) -> Option<Adjustment> {
        *self
    }
}

/// Combine the adjustments of `lines` into one total.
///
/// Returns `None` when no line carries an adjustment. Inputs are read only;
/// the total is always a fresh value.
pub fn combine_adjustments<'a, L>(lines: impl IntoIterator<Item = &'a L>) -> Option<Adjustment>
where
    L: AdjustmentSource + ?Sized + 'a,
{
    lines
        .into_iter()
        .filter_map(AdjustmentSource::adjustment)
        .reduce(|total, next| total.combine(&next))
}
