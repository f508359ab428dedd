//! End-to-end scenarios for antimagic-core: whole runs over temporary projects.

use crate::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

fn write_file(file: &Path, content: &str) {
    fs::create_dir_all(file.parent().unwrap()).unwrap();
    fs::write(file, content).unwrap();
}

fn read(root: &Path, relative: &str) -> String {
    fs::read_to_string(root.join(relative)).unwrap()
}

fn setup_temp_project() -> PathBuf {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir()
        .join("antimagic_tests")
        .join(format!("{}_{}", std::process::id(), id));

    if dir.exists() {
        fs::remove_dir_all(&dir).ok();
    }
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Every file under `root` with its bytes.
fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let relative = e.path().strip_prefix(root).unwrap().to_path_buf();
            (relative, fs::read(e.path()).unwrap())
        })
        .collect()
}

fn paths(list: &[&str]) -> Vec<PathBuf> {
    list.iter().map(PathBuf::from).collect()
}

/// Answers from a fixed value → proposal table.
struct Scripted(BTreeMap<String, String>);

impl Scripted {
    fn new(entries: &[(&str, &str)]) -> Box<Self> {
        Box::new(Self(
            entries
                .iter()
                .map(|(value, name)| (value.to_string(), name.to_string()))
                .collect(),
        ))
    }
}

impl NamingAssistant for Scripted {
    fn propose_names(
        &self,
        values: &[&str],
        _taken: &BTreeSet<String>,
    ) -> AntimagicResult<BTreeMap<usize, String>> {
        Ok(values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| self.0.get(*v).map(|name| (i, name.clone())))
            .collect())
    }
}

// Core Test 1: Single-file literal goes to the file's mirror
#[test]
fn test_extracts_single_file_literal() {
    let root = setup_temp_project();
    write_file(
        &root.join("app/main.py"),
        "def greet():\n    return \"hello world\"\n",
    );

    let outcome = Antimagic::new(&root).run().unwrap();
    assert_eq!(
        outcome,
        RunOutcome::Modified {
            files: paths(&["app/main.py", "generated_constants/app/main.py"])
        }
    );
    assert_eq!(
        read(&root, "generated_constants/app/main.py"),
        "from typing import Final\n\nHELLO_WORLD: Final[str] = \"hello world\"\n"
    );
    assert_eq!(
        read(&root, "app/main.py"),
        "from generated_constants.app.main import HELLO_WORLD\ndef greet():\n    return HELLO_WORLD\n"
    );
}

// Core Test 2: A rerun over its own output changes nothing
#[test]
fn test_second_run_is_idempotent() {
    let root = setup_temp_project();
    write_file(&root.join("app.py"), "x = \"hello\"\ny = \"Yes\"\nz = \"YES\"\n");

    assert!(matches!(
        Antimagic::new(&root).run().unwrap(),
        RunOutcome::Modified { .. }
    ));
    let before = snapshot(&root);

    assert_eq!(Antimagic::new(&root).run().unwrap(), RunOutcome::Clean);
    assert_eq!(snapshot(&root), before);
}

// Core Test 3: Shared values go to the nearest common package
#[test]
fn test_shared_literal_goes_to_common_package() {
    let root = setup_temp_project();
    write_file(&root.join("a/b.py"), "x = \"shared value\"\n");
    write_file(&root.join("a/c.py"), "y = \"shared value\"\n");

    let outcome = Antimagic::new(&root).run().unwrap();
    assert_eq!(
        outcome,
        RunOutcome::Modified {
            files: paths(&["a/b.py", "a/c.py", "generated_constants/a/__init__.py"])
        }
    );
    assert_eq!(
        read(&root, "generated_constants/a/__init__.py"),
        "from typing import Final\n\nSHARED_VALUE: Final[str] = \"shared value\"\n"
    );
    assert_eq!(
        read(&root, "a/b.py"),
        "from generated_constants.a import SHARED_VALUE\nx = SHARED_VALUE\n"
    );
    assert_eq!(
        read(&root, "a/c.py"),
        "from generated_constants.a import SHARED_VALUE\ny = SHARED_VALUE\n"
    );
}

// Core Test 4: Case variants get distinct suffixed names without an assistant
#[test]
fn test_case_pair_is_disambiguated() {
    let root = setup_temp_project();
    write_file(&root.join("app.py"), "a = \"Yes\"\nb = \"YES\"\n");

    Antimagic::new(&root)
        .duplicates_solver(DuplicatePolicy::Exception)
        .run()
        .unwrap();
    assert_eq!(
        read(&root, "generated_constants/app.py"),
        "from typing import Final\n\nYES_CAPITALIZED: Final[str] = \"Yes\"\nYES_UPPERCASE: Final[str] = \"YES\"\n"
    );
    assert_eq!(
        read(&root, "app.py"),
        "from generated_constants.app import YES_CAPITALIZED, YES_UPPERCASE\na = YES_CAPITALIZED\nb = YES_UPPERCASE\n"
    );
}

// Core Test 5: A renamed constant keeps its old name bound
#[test]
fn test_rename_keeps_old_name_importable() {
    let root = setup_temp_project();
    write_file(
        &root.join("generated_constants/app.py"),
        "from typing import Final\n\nFOO: Final[str] = \"x\"\n",
    );
    write_file(&root.join("app.py"), "value = \"x\"\n");

    Antimagic::new(&root).run().unwrap();
    assert_eq!(
        read(&root, "generated_constants/app.py"),
        "from typing import Final\n\nX: Final[str] = \"x\"\n\nFOO = X\n"
    );
    assert_eq!(read(&root, "app.py"), "from generated_constants.app import X\nvalue = X\n");

    let before = snapshot(&root);
    assert_eq!(Antimagic::new(&root).run().unwrap(), RunOutcome::Clean);
    assert_eq!(snapshot(&root), before);
}

// Core Test 6: A new user elsewhere moves the constant up; the old module re-exports it
#[test]
fn test_reuse_moves_constant_to_shared_package() {
    let root = setup_temp_project();
    write_file(&root.join("app.py"), "x = \"hello\"\n");
    Antimagic::new(&root).run().unwrap();
    assert_eq!(read(&root, "app.py"), "from generated_constants.app import HELLO\nx = HELLO\n");

    write_file(&root.join("b.py"), "y = \"hello\"\n");
    let outcome = Antimagic::new(&root).run().unwrap();
    assert_eq!(
        outcome,
        RunOutcome::Modified {
            files: paths(&["b.py", "generated_constants/__init__.py", "generated_constants/app.py"])
        }
    );
    assert_eq!(
        read(&root, "generated_constants/__init__.py"),
        "from typing import Final\n\nHELLO: Final[str] = \"hello\"\n"
    );
    assert_eq!(
        read(&root, "generated_constants/app.py"),
        "from typing import Final\nfrom generated_constants import HELLO\n_ = (HELLO,)\n"
    );
    assert_eq!(read(&root, "b.py"), "from generated_constants import HELLO\ny = HELLO\n");
    assert_eq!(read(&root, "app.py"), "from generated_constants.app import HELLO\nx = HELLO\n");

    let before = snapshot(&root);
    assert_eq!(Antimagic::new(&root).run().unwrap(), RunOutcome::Clean);
    assert_eq!(snapshot(&root), before);
}

// Core Test 7: f-strings become `.format` calls on a template constant
#[test]
fn test_f_string_becomes_format_call() {
    let root = setup_temp_project();
    write_file(
        &root.join("app.py"),
        "def hello(name):\n    return f\"Hello {name}\"\n",
    );

    Antimagic::new(&root).run().unwrap();
    assert_eq!(
        read(&root, "generated_constants/app.py"),
        "from typing import Final\n\nHELLO_FORMATTED: Final[str] = \"Hello {}\"\n"
    );
    assert_eq!(
        read(&root, "app.py"),
        "from generated_constants.app import HELLO_FORMATTED\ndef hello(name):\n    return HELLO_FORMATTED.format(name)\n"
    );
}

// Core Test 8: Imports go below the docstring and `__future__` imports
#[test]
fn test_import_is_inserted_after_module_header() {
    let root = setup_temp_project();
    write_file(
        &root.join("app.py"),
        "\"\"\"Module doc.\"\"\"\nfrom __future__ import annotations\n\nimport os\n\nx = \"some value\"\n",
    );

    Antimagic::new(&root).run().unwrap();
    assert_eq!(
        read(&root, "app.py"),
        "\"\"\"Module doc.\"\"\"\nfrom __future__ import annotations\nfrom generated_constants.app import SOME_VALUE\n\nimport os\n\nx = SOME_VALUE\n"
    );
}

// Core Test 9: Excluded literals and excluded paths stay untouched
#[test]
fn test_exclusions_are_respected() {
    let root = setup_temp_project();
    write_file(
        &root.join("app.py"),
        "\"\"\"Doc string here.\"\"\"\nNAME = \"skip me\"\nvalue = \"keep me\"\n",
    );
    write_file(&root.join("vendor/lib.py"), "v = \"vendored text\"\n");

    Antimagic::new(&root).exclude(["vendor"]).run().unwrap();
    assert_eq!(
        read(&root, "generated_constants/app.py"),
        "from typing import Final\n\nKEEP_ME: Final[str] = \"keep me\"\n"
    );
    assert_eq!(
        read(&root, "app.py"),
        "\"\"\"Doc string here.\"\"\"\nfrom generated_constants.app import KEEP_ME\nNAME = \"skip me\"\nvalue = KEEP_ME\n"
    );
    assert_eq!(read(&root, "vendor/lib.py"), "v = \"vendored text\"\n");
    assert!(!root.join("generated_constants/vendor").exists());
}

// Core Test 10: Report-only lists literals and writes nothing
#[test]
fn test_report_only_writes_nothing() {
    let root = setup_temp_project();
    write_file(&root.join("app.py"), "a = \"go home\"\nb = \"go home\"\n");
    write_file(&root.join("b/c.py"), "c = \"hello\"\n");
    let before = snapshot(&root);

    let outcome = Antimagic::new(&root).modify(false).run().unwrap();
    let RunOutcome::Findings(findings) = outcome else {
        panic!("expected findings, got {:?}", outcome);
    };
    assert_eq!(findings.kind, FindingKind::ReportOnly);
    assert_eq!(findings.by_file[Path::new("app.py")], vec!["go home".to_string()]);
    assert_eq!(findings.by_file[Path::new("b/c.py")], vec!["hello".to_string()]);
    assert_eq!(snapshot(&root), before);
}

// Core Test 11: `exception` policies report instead of writing
#[test]
fn test_exception_policies_do_not_mutate() {
    let root = setup_temp_project();
    write_file(&root.join("app.py"), "token = \"deadbeef\"\nok = \"hello\"\n");
    let before = snapshot(&root);

    let outcome = Antimagic::new(&root)
        .difficult_string_solver(DifficultPolicy::Exception)
        .run()
        .unwrap();
    let RunOutcome::Findings(findings) = outcome else {
        panic!("expected findings, got {:?}", outcome);
    };
    assert_eq!(findings.kind, FindingKind::Unnameable);
    assert_eq!(findings.by_file[Path::new("app.py")], vec!["deadbeef".to_string()]);
    assert_eq!(snapshot(&root), before);

    write_file(&root.join("app.py"), "a = \"go home\"\nb = \"go-home\"\n");
    let before = snapshot(&root);
    let outcome = Antimagic::new(&root)
        .duplicates_solver(DuplicatePolicy::Exception)
        .run()
        .unwrap();
    let RunOutcome::Findings(findings) = outcome else {
        panic!("expected findings, got {:?}", outcome);
    };
    assert_eq!(findings.kind, FindingKind::Duplicate);
    assert_eq!(
        findings.by_file[Path::new("app.py")],
        vec!["go home".to_string(), "go-home".to_string()]
    );
    assert_eq!(snapshot(&root), before);
}

// Core Test 12: `most_common` keeps the name for the most used value
#[test]
fn test_most_common_leaves_loser_inline() {
    let root = setup_temp_project();
    write_file(
        &root.join("app.py"),
        "a = \"go home\"\nb = \"go home\"\nc = \"go-home\"\n",
    );

    Antimagic::new(&root)
        .duplicates_solver(DuplicatePolicy::MostCommon)
        .run()
        .unwrap();
    assert_eq!(
        read(&root, "app.py"),
        "from generated_constants.app import GO_HOME\na = GO_HOME\nb = GO_HOME\nc = \"go-home\"\n"
    );
}

// Core Test 13: A stuck assistant aborts the run and restores everything
#[test]
fn test_ai_non_convergence_rolls_back() {
    let root = setup_temp_project();
    write_file(
        &root.join("generated_constants/old.py"),
        "from typing import Final\n\nOLD: Final[str] = \"old\"\n",
    );
    write_file(&root.join("app.py"), "a = \"go home\"\nb = \"go-home\"\n");
    let before = snapshot(&root);

    let err = Antimagic::new(&root)
        .duplicates_solver(DuplicatePolicy::Ai)
        .with_assistant(Scripted::new(&[("go home", "GO_HOME"), ("go-home", "GO_HOME")]))
        .run()
        .unwrap_err();
    match err {
        AntimagicError::DuplicateResolution { values } => {
            assert!(values.contains("go home") && values.contains("go-home"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(snapshot(&root), before);
}

// Core Test 14: The assistant names what the engine cannot
#[test]
fn test_ai_names_difficult_strings() {
    let root = setup_temp_project();
    write_file(&root.join("app.py"), "token = \"deadbeef\"\n");

    Antimagic::new(&root)
        .difficult_string_solver(DifficultPolicy::Ai)
        .with_assistant(Scripted::new(&[("deadbeef", "beef marker")]))
        .run()
        .unwrap();
    assert_eq!(
        read(&root, "generated_constants/app.py"),
        "from typing import Final\n\nBEEF_MARKER: Final[str] = \"deadbeef\"\n"
    );
    assert_eq!(
        read(&root, "app.py"),
        "from generated_constants.app import BEEF_MARKER\ntoken = BEEF_MARKER\n"
    );
}

// Core Test 15: Without an assistant the `ai` policy is fatal and nothing is written
#[test]
fn test_missing_assistant_is_fatal() {
    let root = setup_temp_project();
    write_file(&root.join("app.py"), "token = \"deadbeef\"\nok = \"hello\"\n");
    let before = snapshot(&root);

    let err = Antimagic::new(&root)
        .difficult_string_solver(DifficultPolicy::Ai)
        .with_assistant(Box::new(DisabledAssistant))
        .run()
        .unwrap_err();
    assert!(matches!(err, AntimagicError::Assistant { .. }));
    assert_eq!(snapshot(&root), before);
}

// Core Test 16: The configured suffix is applied everywhere and stripped on reload
#[test]
fn test_const_name_suffix() {
    let root = setup_temp_project();
    write_file(&root.join("app.py"), "x = \"hello\"\n");

    Antimagic::new(&root).const_name_suffix("_C").run().unwrap();
    assert_eq!(
        read(&root, "generated_constants/app.py"),
        "from typing import Final\n\nHELLO_C: Final[str] = \"hello\"\n"
    );
    assert_eq!(read(&root, "app.py"), "from generated_constants.app import HELLO_C\nx = HELLO_C\n");

    // A new use elsewhere finds the persisted constant under its bare name.
    write_file(&root.join("b.py"), "y = \"hello\"\n");
    Antimagic::new(&root).const_name_suffix("_C").run().unwrap();
    assert_eq!(
        read(&root, "generated_constants/__init__.py"),
        "from typing import Final\n\nHELLO_C: Final[str] = \"hello\"\n"
    );
    assert_eq!(
        read(&root, "generated_constants/app.py"),
        "from typing import Final\nfrom generated_constants import HELLO_C\n_ = (HELLO_C,)\n"
    );
}

// Core Test 17: Nothing magic means nothing written
#[test]
fn test_clean_project() {
    let root = setup_temp_project();
    write_file(&root.join("app.py"), "\"\"\"Only a docstring.\"\"\"\nX = \"constant\"\n");
    let before = snapshot(&root);

    assert_eq!(Antimagic::new(&root).run().unwrap(), RunOutcome::Clean);
    assert_eq!(snapshot(&root), before);
    assert!(!root.join("generated_constants").exists());
}

// Core Test 18: A broken source file is skipped, the rest still rewritten
#[test]
fn test_syntax_error_file_is_skipped() {
    let root = setup_temp_project();
    write_file(&root.join("broken.py"), "def oops(:\n    \"text\"\n");
    write_file(&root.join("app.py"), "x = \"hello\"\n");

    let outcome = Antimagic::new(&root).run().unwrap();
    assert_eq!(
        outcome,
        RunOutcome::Modified {
            files: paths(&["app.py", "generated_constants/app.py"])
        }
    );
    assert_eq!(read(&root, "broken.py"), "def oops(:\n    \"text\"\n");
}

// Core Test 19: Configuration file round trip through the builder
#[test]
fn test_config_file_drives_run() {
    let root = setup_temp_project();
    write_file(
        &root.join(CONFIG_FILE_NAME),
        "output_dir = \"consts\"\nmodify = false\n",
    );
    write_file(&root.join("app.py"), "x = \"hello\"\n");

    let mut config = load_config(&root).unwrap().unwrap();
    config.root = root.clone();
    let outcome = Antimagic::from_config(config).run().unwrap();
    assert!(matches!(outcome, RunOutcome::Findings(ref f) if f.kind == FindingKind::ReportOnly));
    assert!(!root.join("consts").exists());
}

// Core Test 20: Names replacing literals that touch keywords stay separate tokens
#[test]
fn test_replacement_next_to_keyword_is_spaced() {
    let root = setup_temp_project();
    write_file(
        &root.join("app.py"),
        "def pick(c):\n    return\"hello\"if c else\"world\"\n",
    );

    Antimagic::new(&root).run().unwrap();
    assert_eq!(
        read(&root, "app.py"),
        "from generated_constants.app import HELLO, WORLD\ndef pick(c):\n    return HELLO if c else WORLD\n"
    );
}

// Core Test 21: A constant renamed twice leaves every old name bound to the newest
#[test]
fn test_rename_chain_aliases_point_at_current_name() {
    let root = setup_temp_project();
    write_file(
        &root.join("generated_constants/app.py"),
        "from typing import Final\n\nCCC: Final[str] = \"x\"\n\nBBB = CCC\n",
    );
    write_file(&root.join("app.py"), "value = \"x\"\n");

    Antimagic::new(&root).run().unwrap();
    assert_eq!(
        read(&root, "generated_constants/app.py"),
        "from typing import Final\n\nX: Final[str] = \"x\"\n\nBBB = X\nCCC = X\n"
    );

    let before = snapshot(&root);
    assert_eq!(Antimagic::new(&root).run().unwrap(), RunOutcome::Clean);
    assert_eq!(snapshot(&root), before);
}

// Core Test 22: A moved constant's old module re-exports its alias under the same name
#[test]
fn test_move_keeps_alias_named_like_new_constant() {
    let root = setup_temp_project();
    write_file(
        &root.join("generated_constants/a.py"),
        "from typing import Final\n\nBAR: Final[str] = \"foo\"\n\nFOO = BAR\n",
    );
    write_file(&root.join("a.py"), "x = \"foo\"\n");
    write_file(&root.join("b.py"), "y = \"foo\"\n");

    Antimagic::new(&root).run().unwrap();
    assert_eq!(
        read(&root, "generated_constants/a.py"),
        "from typing import Final\nfrom generated_constants import FOO as BAR\nfrom generated_constants import FOO\n_ = (BAR, FOO)\n"
    );
    assert_eq!(
        read(&root, "generated_constants/__init__.py"),
        "from typing import Final\n\nFOO: Final[str] = \"foo\"\n\nBAR = FOO\n"
    );
    assert_eq!(read(&root, "a.py"), "from generated_constants import FOO\nx = FOO\n");
}

// Core Test 23: A tuple interpolation stays a single `.format` argument
#[test]
fn test_f_string_tuple_is_one_argument() {
    let root = setup_temp_project();
    write_file(
        &root.join("app.py"),
        "def show(a, b):\n    return f\"pair {a, b}\"\n",
    );

    Antimagic::new(&root).run().unwrap();
    assert_eq!(
        read(&root, "app.py"),
        "from generated_constants.app import PAIR_FORMATTED\ndef show(a, b):\n    return PAIR_FORMATTED.format((a, b))\n"
    );
}

// Core Test 24: Explicit non-Python paths are not rewritten
#[test]
fn test_explicit_non_python_path_is_ignored() {
    let root = setup_temp_project();
    write_file(&root.join("notes.txt"), "x = \"hello\"\n");
    write_file(&root.join("app.py"), "y = \"world\"\n");

    let outcome = Antimagic::new(&root).paths(["notes.txt", "app.py"]).run().unwrap();
    assert_eq!(
        outcome,
        RunOutcome::Modified {
            files: paths(&["app.py", "generated_constants/app.py"])
        }
    );
    assert_eq!(read(&root, "notes.txt"), "x = \"hello\"\n");
    assert!(!root.join("generated_constants/notes.py").exists());
}
