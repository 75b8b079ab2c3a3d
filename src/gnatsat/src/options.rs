//! Option registry.
//!
//! Every option is a statically declared record `(name, kind, min, max,
//! default, category)`. Values are clamped into `[min, max]` on `set`.
//! Options are only mutable while the solver is in its configuration state;
//! the facade enforces that, this module only stores and parses.

use std::fmt;

/// Discriminates the value kind of an option record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptKind {
    Bool,
    Int,
    Double,
}

/// A single statically declared option.
pub struct OptRecord {
    pub name: &'static str,
    pub kind: OptKind,
    pub min: f64,
    pub max: f64,
    pub default: f64,
    pub category: &'static str,
    /// Step-limit options are scaled by `optimize`.
    pub step_limit: bool,
    pub help: &'static str,
}

macro_rules! opt {
    ($name:expr, $kind:ident, $min:expr, $max:expr, $default:expr, $cat:expr, $help:expr) => {
        OptRecord {
            name: $name,
            kind: OptKind::$kind,
            min: $min,
            max: $max,
            default: $default,
            category: $cat,
            step_limit: false,
            help: $help,
        }
    };
    (steps $name:expr, $min:expr, $max:expr, $default:expr, $cat:expr, $help:expr) => {
        OptRecord {
            name: $name,
            kind: OptKind::Int,
            min: $min,
            max: $max,
            default: $default,
            category: $cat,
            step_limit: true,
            help: $help,
        }
    };
}

/// The full table. Kept sorted by name.
pub static OPTIONS: &[OptRecord] = &[
    opt!("binary", Bool, 0.0, 1.0, 0.0, "io", "emit DRAT proofs in binary format"),
    opt!("block", Bool, 0.0, 1.0, 1.0, "inprocessing", "blocked clause elimination"),
    opt!(steps "blocklim", 1.0, 2e9, 1e6, "inprocessing", "blocked clause elimination step limit"),
    opt!("ccmin", Int, 0.0, 2.0, 2.0, "core", "conflict clause minimization (0=none, 1=basic, 2=deep)"),
    opt!("compact", Bool, 0.0, 1.0, 1.0, "inprocessing", "compact the internal variable range"),
    opt!("compactint", Int, 1.0, 2e9, 2000.0, "inprocessing", "conflicts between compaction attempts"),
    opt!("compactlim", Double, 0.0, 1.0, 0.1, "inprocessing", "inactive fraction triggering compaction"),
    opt!("decompose", Bool, 0.0, 1.0, 1.0, "inprocessing", "equivalence substitution over binary implications"),
    opt!(steps "decomposelim", 1.0, 2e9, 1e6, "inprocessing", "equivalence substitution step limit"),
    opt!("elim", Bool, 0.0, 1.0, 1.0, "inprocessing", "bounded variable elimination"),
    opt!("elimgrowth", Int, 0.0, 1000.0, 0.0, "inprocessing", "allowed clause growth per elimination"),
    opt!(steps "elimlim", 1.0, 2e9, 2e6, "inprocessing", "variable elimination step limit"),
    opt!("elimocclim", Int, 1.0, 2e9, 100.0, "inprocessing", "occurrence cap for elimination candidates"),
    opt!("elimrounds", Int, 1.0, 512.0, 2.0, "inprocessing", "elimination rounds per inprocessing pass"),
    opt!("initphase", Bool, 0.0, 1.0, 0.0, "core", "initial decision phase of fresh variables"),
    opt!("inprocessing", Bool, 0.0, 1.0, 1.0, "inprocessing", "enable inprocessing between restarts"),
    opt!("inprocessint", Int, 1.0, 2e9, 2000.0, "inprocessing", "conflicts between inprocessing rounds"),
    opt!("keepglue", Int, 1.0, 1e9, 2.0, "reduce", "redundant clauses of this glue or less are kept"),
    opt!("keepused", Bool, 0.0, 1.0, 1.0, "reduce", "protect recently used clauses from reduction"),
    opt!("luby", Bool, 0.0, 1.0, 0.0, "restart", "luby restart schedule instead of glue averages"),
    opt!("lubybase", Int, 1.0, 2e9, 100.0, "restart", "base interval of the luby schedule"),
    opt!("minimize", Bool, 0.0, 1.0, 1.0, "core", "minimize learned clauses"),
    opt!("phasesaving", Int, 0.0, 2.0, 2.0, "core", "phase saving (0=none, 1=limited, 2=full)"),
    opt!("probe", Bool, 0.0, 1.0, 1.0, "inprocessing", "failed literal probing"),
    opt!(steps "probelim", 1.0, 2e9, 1e5, "inprocessing", "failed literal probing step limit"),
    opt!("reducefraction", Double, 0.0, 1.0, 0.75, "reduce", "fraction of reduction candidates removed"),
    opt!("reduceint", Int, 10.0, 2e9, 300.0, "reduce", "initial conflicts between reductions"),
    opt!("restartint", Int, 1.0, 2e9, 2.0, "restart", "minimal conflicts between restarts"),
    opt!("restartmargin", Double, 1.0, 10.0, 1.1, "restart", "restart when fast glue average exceeds slow by this factor"),
    opt!("seed", Int, 0.0, 2e9, 0.0, "core", "random seed"),
    opt!("subsume", Bool, 0.0, 1.0, 1.0, "inprocessing", "clause subsumption and strengthening"),
    opt!(steps "subsumelim", 1.0, 2e9, 1e6, "inprocessing", "subsumption step limit"),
    opt!("verbose", Int, 0.0, 3.0, 0.0, "core", "verbosity level"),
    opt!("vivify", Bool, 0.0, 1.0, 1.0, "inprocessing", "clause vivification"),
    opt!(steps "vivifylim", 1.0, 2e9, 1e5, "inprocessing", "vivification step limit"),
];

/// Named option presets applied by `configure`.
pub static CONFIGURATIONS: &[(&str, &[(&str, f64)])] = &[
    ("default", &[]),
    (
        "plain",
        &[
            ("block", 0.0),
            ("decompose", 0.0),
            ("elim", 0.0),
            ("inprocessing", 0.0),
            ("probe", 0.0),
            ("subsume", 0.0),
            ("vivify", 0.0),
        ],
    ),
    (
        "sat",
        &[("initphase", 1.0), ("restartint", 50.0), ("restartmargin", 1.4)],
    ),
    (
        "unsat",
        &[("initphase", 0.0), ("restartint", 1.0), ("restartmargin", 1.02)],
    ),
];

/// Current option values, parallel to `OPTIONS`.
#[derive(Clone)]
pub struct Options {
    vals: Vec<f64>,
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut m = f.debug_struct("Options");
        for (rec, &v) in OPTIONS.iter().zip(self.vals.iter()) {
            if v != rec.default {
                m.field(rec.name, &v);
            }
        }
        m.finish()
    }
}

impl Default for Options {
    fn default() -> Self {
        Options {
            vals: OPTIONS.iter().map(|o| o.default).collect(),
        }
    }
}

fn index_of(name: &str) -> Option<usize> {
    OPTIONS.binary_search_by(|o| o.name.cmp(name)).ok()
}

/// Whether `name` is a known option.
pub fn is_valid_option(name: &str) -> bool {
    index_of(name).is_some()
}

/// Whether `name` enables a preprocessing / inprocessing technique.
pub fn is_preprocessing_option(name: &str) -> bool {
    match index_of(name) {
        Some(i) => OPTIONS[i].category == "inprocessing" && OPTIONS[i].kind == OptKind::Bool,
        None => false,
    }
}

/// Whether `arg` is a valid `--name`, `--no-name` or `--name=val` form.
pub fn is_valid_long_option(arg: &str) -> bool {
    parse_long_option(arg).map_or(false, |(name, _)| is_valid_option(name))
}

/// Whether `name` is a known configuration preset.
pub fn is_valid_configuration(name: &str) -> bool {
    CONFIGURATIONS.iter().any(|(n, _)| *n == name)
}

/// Split a long option into `(name, value)`. Returns `None` on malformed
/// input (missing `--` prefix or unparsable value).
fn parse_long_option(arg: &str) -> Option<(&str, f64)> {
    let rest = arg.strip_prefix("--")?;
    if let Some(name) = rest.strip_prefix("no-") {
        if name.is_empty() {
            return None;
        }
        return Some((name, 0.0));
    }
    match rest.find('=') {
        None => {
            if rest.is_empty() {
                None
            } else {
                Some((rest, 1.0))
            }
        }
        Some(pos) => {
            let (name, val) = (&rest[..pos], &rest[pos + 1..]);
            let parsed = match val {
                "true" => 1.0,
                "false" => 0.0,
                _ => val.parse::<f64>().ok()?,
            };
            Some((name, parsed))
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of `name`, zero if unknown.
    pub fn get(&self, name: &str) -> f64 {
        match index_of(name) {
            Some(i) => self.vals[i],
            None => 0.0,
        }
    }

    #[inline]
    pub fn get_bool(&self, name: &str) -> bool {
        self.get(name) != 0.0
    }

    #[inline]
    pub fn get_i64(&self, name: &str) -> i64 {
        self.get(name) as i64
    }

    /// Set `name` to `val` clamped into its legal range. Returns whether the
    /// option exists; out-of-range values still count as success.
    pub fn set(&mut self, name: &str, val: f64) -> bool {
        match index_of(name) {
            None => false,
            Some(i) => {
                let rec = &OPTIONS[i];
                let mut v = val;
                if v < rec.min {
                    v = rec.min;
                }
                if v > rec.max {
                    v = rec.max;
                }
                if rec.kind != OptKind::Double {
                    v = v.round();
                }
                self.vals[i] = v;
                true
            }
        }
    }

    /// Accept `--<name>`, `--no-<name>` and `--<name>=<val>`.
    pub fn set_long_option(&mut self, arg: &str) -> bool {
        match parse_long_option(arg) {
            Some((name, val)) => self.set(name, val),
            None => false,
        }
    }

    /// Bulk-apply a named preset. Returns whether the preset exists.
    pub fn configure(&mut self, preset: &str) -> bool {
        for (name, forced) in CONFIGURATIONS.iter() {
            if *name == preset {
                for (opt, val) in forced.iter() {
                    let ok = self.set(opt, *val);
                    debug_assert!(ok, "preset names a valid option");
                }
                return true;
            }
        }
        false
    }

    /// Multiply all pre/inprocessing step limits by `10^clamp(val, 0, 9)`.
    pub fn optimize(&mut self, val: i32) {
        let e = val.max(0).min(9);
        let factor = 10f64.powi(e);
        for (i, rec) in OPTIONS.iter().enumerate() {
            if rec.step_limit {
                let mut v = self.vals[i] * factor;
                if v > rec.max {
                    v = rec.max;
                }
                self.vals[i] = v;
            }
        }
    }

    /// Iterate `(record, current value)` pairs, for reporting.
    pub fn iter(&self) -> impl Iterator<Item = (&'static OptRecord, f64)> + '_ {
        OPTIONS.iter().zip(self.vals.iter().copied())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_table_is_sorted() {
        for w in OPTIONS.windows(2) {
            assert!(w[0].name < w[1].name, "{} >= {}", w[0].name, w[1].name);
        }
    }

    #[test]
    fn test_set_clamps() {
        let mut opts = Options::new();
        assert!(opts.set("ccmin", 17.0));
        assert_eq!(opts.get("ccmin"), 2.0);
        assert!(opts.set("ccmin", -3.0));
        assert_eq!(opts.get("ccmin"), 0.0);
        assert!(!opts.set("no-such-option", 1.0));
    }

    #[test]
    fn test_long_option_forms() {
        let mut opts = Options::new();
        assert!(opts.set_long_option("--no-elim"));
        assert!(!opts.get_bool("elim"));
        assert!(opts.set_long_option("--elim"));
        assert!(opts.get_bool("elim"));
        assert!(opts.set_long_option("--restartint=42"));
        assert_eq!(opts.get_i64("restartint"), 42);
        assert!(opts.set_long_option("--luby=true"));
        assert!(opts.get_bool("luby"));
        assert!(!opts.set_long_option("-elim"));
        assert!(!opts.set_long_option("--restartint=forty"));
    }

    #[test]
    fn test_configure_plain_disables_inprocessing() {
        let mut opts = Options::new();
        assert!(opts.configure("plain"));
        assert!(!opts.get_bool("elim"));
        assert!(!opts.get_bool("subsume"));
        assert!(!opts.get_bool("inprocessing"));
        assert!(!opts.configure("speedy"));
    }

    #[test]
    fn test_optimize_scales_step_limits() {
        let mut opts = Options::new();
        let before = opts.get("vivifylim");
        opts.optimize(2);
        assert_eq!(opts.get("vivifylim"), (before * 100.0).min(2e9));
        // values above 9 are reduced to 9, below 0 ignored
        let mut opts2 = Options::new();
        opts2.optimize(-5);
        assert_eq!(opts2.get("vivifylim"), before);
    }

    #[test]
    fn test_preprocessing_options() {
        assert!(is_preprocessing_option("elim"));
        assert!(!is_preprocessing_option("elimlim"));
        assert!(!is_preprocessing_option("verbose"));
    }
}
