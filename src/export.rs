//! Delimited text export of packing plans.

use crate::model::PackingPlan;
use crate::types::ItemSize;

/// Settings for the CSV export.
#[derive(Copy, Clone, Debug)]
pub struct ExportConfig {
    /// Cell separator
    pub delimiter: char,
    /// Whether the first line names the columns
    pub include_header: bool,
}

impl ExportConfig {
    pub const DEFAULT_DELIMITER: char = ';';
    pub const DEFAULT_INCLUDE_HEADER: bool = true;

    /// Creates a builder for a custom configuration.
    pub fn builder() -> ExportConfigBuilder {
        ExportConfigBuilder::default()
    }

    /// Character substituted for delimiters occurring inside a cell.
    fn replacement(&self) -> char {
        if self.delimiter == ',' { ';' } else { ',' }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            delimiter: Self::DEFAULT_DELIMITER,
            include_header: Self::DEFAULT_INCLUDE_HEADER,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ExportConfigBuilder {
    config: ExportConfig,
}

impl ExportConfigBuilder {
    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.config.delimiter = delimiter;
        self
    }

    pub fn include_header(mut self, include: bool) -> Self {
        self.config.include_header = include;
        self
    }

    pub fn build(self) -> ExportConfig {
        self.config
    }
}

/// Renders one row per box: index, name and the four size counts.
///
/// Box order is preserved. Lines are joined with `\n` without a trailing newline.
pub fn render_csv(plan: &PackingPlan, config: &ExportConfig) -> String {
    let mut rows: Vec<Vec<String>> = Vec::with_capacity(plan.boxes.len() + 1);

    if config.include_header {
        let mut header = vec!["Box".to_string(), "Combination".to_string()];
        header.extend(ItemSize::ALL.iter().map(|size| size.label().to_string()));
        rows.push(header);
    }

    for (idx, packed) in plan.boxes.iter().enumerate() {
        let mut row = vec![(idx + 1).to_string(), packed.name.clone()];
        row.extend(packed.units.iter().map(|(_, count)| count.to_string()));
        rows.push(row);
    }

    let separator = config.delimiter.to_string();
    let replacement = config.replacement().to_string();
    rows.iter()
        .map(|row| {
            row.iter()
                .map(|cell| cell.replace(config.delimiter, &replacement))
                .collect::<Vec<_>>()
                .join(&separator)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoxTemplate, InventoryCounts, PackedBox};
    use crate::optimizer::plan_inventory;
    use crate::types::UnitCounts;

    #[test]
    fn renders_header_and_rows() {
        let plan = plan_inventory(&InventoryCounts::new(0, 0, 0, 3));
        let csv = render_csv(&plan, &ExportConfig::default());
        assert_eq!(
            csv,
            "Box;Combination;60;250;340;750\n1;2×750;0;0;0;2\n2;Partial box: 1×750;0;0;0;1"
        );
    }

    #[test]
    fn empty_plan_renders_header_only() {
        let plan = plan_inventory(&InventoryCounts::default());
        assert_eq!(
            render_csv(&plan, &ExportConfig::default()),
            "Box;Combination;60;250;340;750"
        );
        let headless = ExportConfig::builder().include_header(false).build();
        assert_eq!(render_csv(&plan, &headless), "");
    }

    #[test]
    fn delimiter_inside_cells_is_replaced() {
        let template = BoxTemplate::new("odd;name", UnitCounts::new(1, 0, 0, 0));
        let plan = crate::model::PackingPlan::new(
            InventoryCounts::new(1, 0, 0, 0),
            vec![PackedBox::from_template(&template)],
        );

        let csv = render_csv(&plan, &ExportConfig::builder().include_header(false).build());
        assert_eq!(csv, "1;odd,name;1;0;0;0");

        let comma = ExportConfig::builder()
            .delimiter(',')
            .include_header(false)
            .build();
        let plan = crate::model::PackingPlan::new(
            InventoryCounts::new(0, 0, 0, 1),
            vec![PackedBox::from_template(&BoxTemplate::new(
                "a,b",
                UnitCounts::new(0, 0, 0, 1),
            ))],
        );
        assert_eq!(render_csv(&plan, &comma), "1,a;b,0,0,0,1");
    }
}
