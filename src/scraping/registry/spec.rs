//! Page specifications for the two registry pages.
//!
//! Each spec encodes where the ground truth lives on one page: the form
//! selectors, the table wrapper, the "nothing found" notice, the
//! column-rename table, and which wait strategy resolves a submission.
//! Everything is known at build time; adding a page means adding a spec,
//! not touching the submit machine.

/// How a submission is resolved against the page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitStrategy {
    /// Poll until the table content hash differs from the pre-submit
    /// baseline, so a stale table is never read as the new result.
    HashCompare,
    /// Sleep a fixed settle delay instead. The arrests page re-renders its
    /// table without a usable replacement signal, so hash comparison is
    /// exempted there.
    FixedDelay,
}

/// Immutable descriptor of one registry page.
#[derive(Debug)]
pub struct PageSpec {
    pub name: &'static str,
    pub url: &'static str,
    /// IIN input field.
    pub input_sel: &'static str,
    /// Find button.
    pub submit_sel: &'static str,
    /// CSS class of the div around the results table.
    pub table_wrapper_cls: &'static str,
    /// "Nothing found" notice block.
    pub notice_sel: &'static str,
    /// Dismiss control inside the notice.
    pub notice_close_sel: &'static str,
    /// Source-language column labels mapped to fixed field names.
    pub rename: &'static [(&'static str, &'static str)],
    /// When set, source rows keyed by this column pivot into boolean columns.
    pub pivot_column: Option<&'static str>,
    pub wait: WaitStrategy,
}

impl PageSpec {
    /// Fixed field name for a source column label; unmapped labels pass
    /// through unchanged.
    pub fn rename_column<'a>(&self, source: &'a str) -> &'a str {
        self.rename
            .iter()
            .find(|(from, _)| *from == source)
            .map(|(_, to)| *to)
            .unwrap_or(source)
    }
}

const ARRESTS_RENAME: &[(&str, &str)] = &[
    ("ИИН", "iin"),
    ("Арест на банковские счета", "bank_account_freeze"),
    ("Запрет на выезд", "travel_ban"),
    ("Запрет на регистрационные действия", "ban_on_registration_actions"),
    ("Е-Нотариат", "e_notary"),
    ("Арест на имущество", "property_freeze"),
    ("Арест на транспорт", "vehicle_freeze"),
];

const DEBTORS_RENAME: &[(&str, &str)] = &[
    ("ИИН", "iin"),
    ("Категория", "category"),
    ("Номер и дата исполнительного документа", "document_no_date"),
    ("Сумма долга/основание долга", "debt_amount_or_reason"),
    ("Дата исполнительного производства", "execution_date"),
    (
        "Орган исполнительного пр-ва, судебный исполнитель",
        "enforcement_body",
    ),
    ("Орган, выдавший исполнительный документ", "issuing_authority"),
    (
        "Наличие запрета на выезд из РК по исполнительным производствам ЧСИ/ГСИ",
        "travel_ban_status",
    ),
];

/// Arrest / encumbrance register. One boolean-flag row per identifier after
/// pivoting on the encumbrance-type column.
pub const ARRESTS: PageSpec = PageSpec {
    name: "arrests",
    url: "https://aisoip.adilet.gov.kz/forCitizens/findArest",
    input_sel: ".v-text-field__slot input[type='text']",
    submit_sel: "button[type='submit'].primary",
    table_wrapper_cls: "v-data-table__wrapper",
    notice_sel: ".v-alert",
    notice_close_sel: ".v-alert button",
    rename: ARRESTS_RENAME,
    pivot_column: Some("Вид обременения"),
    wait: WaitStrategy::FixedDelay,
};

/// Debtor register. Keeps the source row/column shape aside from renaming.
pub const DEBTORS: PageSpec = PageSpec {
    name: "debtors",
    url: "https://aisoip.adilet.gov.kz/debtors",
    input_sel: ".v-text-field__slot input[type='text']",
    submit_sel: "button[type='submit'].primary",
    table_wrapper_cls: "v-data-table__wrapper",
    notice_sel: ".v-alert",
    notice_close_sel: ".v-alert button",
    rename: DEBTORS_RENAME,
    pivot_column: None,
    wait: WaitStrategy::HashCompare,
};
