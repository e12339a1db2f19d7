use std::path::PathBuf;

use decl_port::batch::{TreeOptions, convert_tree};
use decl_port::{MappingTables, SourceUnit, UnitOutcome, WarningKind, run_batch};

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("decl-port-it-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn middle_unit_empty_is_skipped() {
    let units = vec![
        SourceUnit::new("greet.rb", "class Greet < Foobara::Command\n  inputs who: :string\nend\n"),
        SourceUnit::new("empty.rb", ""),
        SourceUnit::new("ping.rb", "class Ping < Foobara::Command\n  result :boolean\nend\n"),
    ];
    let report = run_batch(&units, &MappingTables::default());

    let statuses: Vec<bool> = report.outcomes.iter().map(UnitOutcome::is_converted).collect();
    assert_eq!(statuses, vec![true, false, true]);
    let UnitOutcome::Skipped { reason, .. } = &report.outcomes[1] else {
        panic!("second unit should be skipped");
    };
    assert_eq!(reason.kind, WarningKind::NoDeclarationFound);

    let stats = report.stats;
    assert_eq!(stats.processed, 3);
    assert_eq!(stats.succeeded, 2);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.fields, 1);
}

#[test]
fn one_malformed_unit_of_many() {
    let mut units: Vec<SourceUnit> = (0..6)
        .map(|i| SourceUnit::new(format!("unit_{i}.rb"), format!("class Unit{i} < C\n  inputs n: :integer\nend\n")))
        .collect();
    units[3] = SourceUnit::new("unit_3.rb", "this is not ruby at all\n");
    let report = run_batch(&units, &MappingTables::default());
    assert_eq!((report.stats.succeeded, report.stats.skipped), (5, 1));
    let sources: Vec<&str> = report.outcomes.iter().map(UnitOutcome::source).collect();
    assert_eq!(sources, units.iter().map(|u| u.name.as_str()).collect::<Vec<_>>());
}

#[test]
fn tree_conversion_mirrors_directories() {
    let src = scratch("tree-src");
    let dest = scratch("tree-dest");
    std::fs::create_dir_all(src.join("billing")).unwrap();
    std::fs::write(
        src.join("billing/create_invoice.rb"),
        "module Billing\n  class CreateInvoice < Foobara::Command\n    inputs do\n      amount :integer, :required, min: 1\n    end\n  end\nend\n",
    )
    .unwrap();
    std::fs::write(src.join("blank.rb"), "\n").unwrap();
    std::fs::write(src.join("binary.rb"), [0xffu8, 0xfe, 0x00]).unwrap();
    std::fs::write(src.join("README.md"), "# not source\n").unwrap();

    let options = TreeOptions { dest: Some(dest.clone()), ..TreeOptions::new(&src) };
    let tree = convert_tree(&options, &MappingTables::default()).unwrap();

    let sources: Vec<&str> = tree.report.outcomes.iter().map(UnitOutcome::source).collect();
    assert_eq!(sources, vec!["billing/create_invoice.rb", "binary.rb", "blank.rb"]);
    assert_eq!(tree.report.stats.succeeded, 1);
    assert_eq!(tree.report.stats.skipped, 2);
    assert_eq!(tree.written, vec![dest.join("billing/create_invoice.py")]);

    let written = std::fs::read_to_string(dest.join("billing/create_invoice.py")).unwrap();
    assert!(written.starts_with("# Converted from Billing::CreateInvoice\n"));
    assert!(written.contains("    amount: int = Field(..., ge=1)\n"));
    assert!(!dest.join("blank.py").exists());

    let _ = std::fs::remove_dir_all(&src);
    let _ = std::fs::remove_dir_all(&dest);
}

#[test]
fn config_overlay_extends_tables_for_a_tree() {
    let src = scratch("tree-config");
    std::fs::write(src.join("pay.rb"), "class Pay < C\n  inputs do\n    amount :money, multiple_of: 5\n  end\nend\n").unwrap();
    let config = src.join("tables.json");
    std::fs::write(
        &config,
        r#"{
            "kinds": { "money": { "type": "Decimal", "imports": ["decimal.Decimal"], "family": "numeric" } },
            "constraints": { "multiple_of": { "template": "multiple_of={value}" } }
        }"#,
    )
    .unwrap();

    let tables = MappingTables::from_config_file(&config).unwrap();
    let tree = convert_tree(&TreeOptions::new(&src), &tables).unwrap();
    assert_eq!(tree.report.stats.warnings, 0);
    let written = std::fs::read_to_string(src.join("pay.py")).unwrap();
    assert!(written.contains("    amount: Optional[Decimal] = Field(default=None, multiple_of=5)\n"));
    assert!(written.contains("from decimal import Decimal\n"));

    let _ = std::fs::remove_dir_all(&src);
}
