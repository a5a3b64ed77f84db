//! Sub-object registry: which kinds a line references and where they live.

use serde::{Deserialize, Serialize};

/// How a line embeds references to a sub-object kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    /// The line holds one id string.
    Single,
    /// The line holds a list of id strings.
    Multi,
}

/// Closed set of record kinds the orchestrator talks to.
///
/// Every variant has an endpoint prefix, so a lookup can never miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubObjectKind {
    Adjustment,
    Cost,
    Details,
    Eresource,
    Location,
    Physical,
    Renewal,
    Source,
    VendorDetail,
    Alerts,
    Claims,
    ReportingCodes,
    FundDistribution,
    /// The parent line record itself.
    PoLines,
}

impl SubObjectKind {
    /// Every kind a line may reference (excludes the line kind itself).
    pub const SUB_OBJECTS: [SubObjectKind; 13] = [
        SubObjectKind::Adjustment,
        SubObjectKind::Cost,
        SubObjectKind::Details,
        SubObjectKind::Eresource,
        SubObjectKind::Location,
        SubObjectKind::Physical,
        SubObjectKind::Renewal,
        SubObjectKind::Source,
        SubObjectKind::VendorDetail,
        SubObjectKind::Alerts,
        SubObjectKind::Claims,
        SubObjectKind::ReportingCodes,
        SubObjectKind::FundDistribution,
    ];

    /// Field name on the line record (and registry key).
    pub fn field_name(self) -> &'static str {
        match self {
            SubObjectKind::Adjustment => "adjustment",
            SubObjectKind::Cost => "cost",
            SubObjectKind::Details => "details",
            SubObjectKind::Eresource => "eresource",
            SubObjectKind::Location => "location",
            SubObjectKind::Physical => "physical",
            SubObjectKind::Renewal => "renewal",
            SubObjectKind::Source => "source",
            SubObjectKind::VendorDetail => "vendor_detail",
            SubObjectKind::Alerts => "alerts",
            SubObjectKind::Claims => "claims",
            SubObjectKind::ReportingCodes => "reporting_codes",
            SubObjectKind::FundDistribution => "fund_distribution",
            SubObjectKind::PoLines => "po_lines",
        }
    }

    /// Relative endpoint prefix, including the trailing slash.
    pub fn endpoint(self) -> &'static str {
        match self {
            SubObjectKind::Adjustment => "/adjustment/",
            SubObjectKind::Cost => "/cost/",
            SubObjectKind::Details => "/details/",
            SubObjectKind::Eresource => "/eresource/",
            SubObjectKind::Location => "/location/",
            SubObjectKind::Physical => "/physical/",
            SubObjectKind::Renewal => "/renewal/",
            SubObjectKind::Source => "/source/",
            SubObjectKind::VendorDetail => "/vendor_detail/",
            SubObjectKind::Alerts => "/alert/",
            SubObjectKind::Claims => "/claim/",
            SubObjectKind::ReportingCodes => "/reporting_code/",
            SubObjectKind::FundDistribution => "/fund_distribution/",
            SubObjectKind::PoLines => "/po_line/",
        }
    }

    /// Collection endpoint (prefix without the trailing slash), used for creates
    /// and list queries.
    pub fn collection_path(self) -> &'static str {
        self.endpoint().trim_end_matches('/')
    }

    /// Endpoint of one record of this kind.
    pub fn record_path(self, id: &str) -> String {
        format!("{}{}", self.endpoint(), id)
    }

    pub fn cardinality(self) -> Cardinality {
        match self {
            SubObjectKind::Alerts
            | SubObjectKind::Claims
            | SubObjectKind::ReportingCodes
            | SubObjectKind::FundDistribution => Cardinality::Multi,
            _ => Cardinality::Single,
        }
    }

    pub fn is_multi_valued(self) -> bool {
        self.cardinality() == Cardinality::Multi
    }

    /// Look a kind up by its line field name.
    pub fn from_field(field: &str) -> Option<Self> {
        Self::SUB_OBJECTS
            .into_iter()
            .chain(core::iter::once(SubObjectKind::PoLines))
            .find(|k| k.field_name() == field)
    }
}

impl core::fmt::Display for SubObjectKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.field_name())
    }
}
