//! Builtin library catalog
//!
//! One static tree describes every builtin namespace, function and value:
//! its documentation, its signature and the type it produces. The resolver,
//! lint rules, completion, hover and the runtime dispatcher all read it.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::semantic::modules::Module;
use crate::types::ForgeType;

/// Root that is always available
pub const CONSOLE: &str = "console";

#[derive(Debug, Clone)]
pub struct BuiltinEntry {
    pub name: &'static str,
    /// Dotted path from the root, e.g. `Sys.cpu.cores`
    pub path: String,
    pub doc: &'static str,
    pub kind: EntryKind,
}

#[derive(Debug, Clone)]
pub enum EntryKind {
    Namespace(Vec<BuiltinEntry>),
    Function {
        signature: &'static str,
        params: Vec<ForgeType>,
        returns: ForgeType,
    },
    Value(ForgeType),
}

impl BuiltinEntry {
    pub fn children(&self) -> &[BuiltinEntry] {
        match &self.kind {
            EntryKind::Namespace(children) => children,
            _ => &[],
        }
    }

    pub fn child(&self, name: &str) -> Option<&BuiltinEntry> {
        self.children().iter().find(|c| c.name == name)
    }

    pub fn is_namespace(&self) -> bool {
        matches!(self.kind, EntryKind::Namespace(_))
    }

    /// Type seen by the resolver when this entry is referenced
    pub fn ty(&self) -> ForgeType {
        match &self.kind {
            EntryKind::Namespace(children) => ForgeType::object(
                children
                    .iter()
                    .map(|c| (c.name.to_string(), c.ty()))
                    .collect::<BTreeMap<_, _>>(),
                false,
            ),
            EntryKind::Function {
                params, returns, ..
            } => ForgeType::function(params.clone(), returns.clone()),
            EntryKind::Value(ty) => ty.clone(),
        }
    }

    /// One-line signature for completion details
    pub fn detail(&self) -> String {
        match &self.kind {
            EntryKind::Namespace(_) => format!("namespace {}", self.path),
            EntryKind::Function { signature, .. } => format!("{}{}", self.path, signature),
            EntryKind::Value(ty) => format!("{}: {}", self.path, ty),
        }
    }

    /// The module gating this entry, `None` for `console`
    pub fn module(&self) -> Option<Module> {
        let root = self.path.split('.').next().unwrap_or_default();
        Module::from_name(root)
    }
}

/// Outcome of walking a dotted chain through the catalog
#[derive(Debug)]
pub enum Lookup<'a> {
    Found(&'a BuiltinEntry),
    /// Segment `index` does not exist below `parent`
    Missing {
        parent: &'a BuiltinEntry,
        index: usize,
    },
    /// The chain continues past a function or value at segment `index`
    PastLeaf {
        leaf: &'a BuiltinEntry,
        index: usize,
    },
}

#[derive(Debug)]
pub struct Catalog {
    roots: Vec<BuiltinEntry>,
}

impl Catalog {
    /// The shared catalog instance
    pub fn global() -> &'static Catalog {
        static CATALOG: OnceLock<Catalog> = OnceLock::new();
        CATALOG.get_or_init(build)
    }

    pub fn roots(&self) -> &[BuiltinEntry] {
        &self.roots
    }

    pub fn root(&self, name: &str) -> Option<&BuiltinEntry> {
        self.roots.iter().find(|r| r.name == name)
    }

    pub fn is_root(&self, name: &str) -> bool {
        self.root(name).is_some()
    }

    /// Walk `root.seg1.seg2...`; `None` when `root` is not a builtin root
    pub fn lookup(&self, root: &str, segments: &[&str]) -> Option<Lookup<'_>> {
        let mut current = self.root(root)?;
        for (index, segment) in segments.iter().enumerate() {
            if !current.is_namespace() {
                return Some(Lookup::PastLeaf {
                    leaf: current,
                    index,
                });
            }
            match current.child(segment) {
                Some(child) => current = child,
                None => {
                    return Some(Lookup::Missing {
                        parent: current,
                        index,
                    })
                }
            }
        }
        Some(Lookup::Found(current))
    }

    /// Entry at an exact dotted path such as `Math.sqrt`
    pub fn get(&self, path: &str) -> Option<&BuiltinEntry> {
        let mut parts = path.split('.');
        let root = parts.next()?;
        let segments: Vec<&str> = parts.collect();
        match self.lookup(root, &segments)? {
            Lookup::Found(entry) => Some(entry),
            _ => None,
        }
    }

    /// Roots and their direct children, the candidates for spelling hints
    pub fn known_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        for root in &self.roots {
            names.push(root.name);
            names.extend(root.children().iter().map(|c| c.name));
        }
        names.sort_unstable();
        names.dedup();
        names
    }
}

//==============================================================================
// Catalog contents
//==============================================================================

fn any() -> ForgeType {
    ForgeType::Any
}
fn num() -> ForgeType {
    ForgeType::Number
}
fn text() -> ForgeType {
    ForgeType::String
}
fn boolean() -> ForgeType {
    ForgeType::Boolean
}
fn void() -> ForgeType {
    ForgeType::Void
}

fn func(
    name: &'static str,
    signature: &'static str,
    doc: &'static str,
    params: Vec<ForgeType>,
    returns: ForgeType,
) -> BuiltinEntry {
    BuiltinEntry {
        name,
        path: String::new(),
        doc,
        kind: EntryKind::Function {
            signature,
            params,
            returns,
        },
    }
}

fn value(name: &'static str, doc: &'static str, ty: ForgeType) -> BuiltinEntry {
    BuiltinEntry {
        name,
        path: String::new(),
        doc,
        kind: EntryKind::Value(ty),
    }
}

fn ns(name: &'static str, doc: &'static str, children: Vec<BuiltinEntry>) -> BuiltinEntry {
    BuiltinEntry {
        name,
        path: String::new(),
        doc,
        kind: EntryKind::Namespace(children),
    }
}

fn assign_paths(entry: &mut BuiltinEntry, prefix: &str) {
    entry.path = if prefix.is_empty() {
        entry.name.to_string()
    } else {
        format!("{}.{}", prefix, entry.name)
    };
    let path = entry.path.clone();
    if let EntryKind::Namespace(children) = &mut entry.kind {
        for child in children {
            assign_paths(child, &path);
        }
    }
}

fn build() -> Catalog {
    let mut roots = vec![
        console(),
        math(),
        time(),
        sys(),
        terminal(),
        file(),
        net(),
        crypto(),
        datetime(),
        regex(),
        json(),
        asynchronous(),
    ];
    for root in &mut roots {
        assign_paths(root, "");
    }
    Catalog { roots }
}

fn console() -> BuiltinEntry {
    ns(
        CONSOLE,
        "Console input and output. Always available.",
        vec![
            ns(
                "text",
                "Write text to the output streams.",
                vec![
                    func("var", "(...values: any) => void", "Print values separated by spaces.", vec![], void()),
                    func("print", "(...values: any) => void", "Print values separated by spaces.", vec![], void()),
                    func("error", "(...values: any) => void", "Print values to the error stream.", vec![], void()),
                ],
            ),
            ns(
                "prompt",
                "Read a line of user input.",
                vec![
                    func("input", "(question: string) => string", "Ask a question and return the raw answer.", vec![text()], text()),
                    func("clean", "(question: string) => string", "Ask a question and return the trimmed answer without control characters.", vec![text()], text()),
                    func("confirm", "(question: string) => boolean", "Ask a yes/no question.", vec![text()], boolean()),
                ],
            ),
            ns(
                "check",
                "Value checks.",
                vec![func(
                    "bool",
                    "(value: any) => boolean",
                    "Interpret a value as a boolean. `true`, `yes`, `y`, `on` and `1` strings count as true.",
                    vec![any()],
                    boolean(),
                )],
            ),
        ],
    )
}

fn math() -> BuiltinEntry {
    let unary = |name, doc| func(name, "(x: number) => number", doc, vec![num()], num());
    ns(
        "Math",
        "Numeric constants and functions.",
        vec![
            value("PI", "Ratio of a circle's circumference to its diameter.", num()),
            value("E", "Euler's number.", num()),
            unary("sqrt", "Square root."),
            unary("abs", "Absolute value."),
            unary("floor", "Largest integer not greater than x."),
            unary("ceil", "Smallest integer not less than x."),
            unary("round", "Nearest integer, halves away from zero."),
            func("min", "(...values: number) => number", "Smallest argument.", vec![], num()),
            func("max", "(...values: number) => number", "Largest argument.", vec![], num()),
            func("pow", "(base: number, exp: number) => number", "base raised to exp.", vec![num(), num()], num()),
            func("random", "() => number", "Uniform number in [0, 1).", vec![], num()),
        ],
    )
}

fn time() -> BuiltinEntry {
    ns(
        "Time",
        "Waiting and frame timing.",
        vec![
            func("wait", "(duration: string | number) => void", "Pause for a duration such as `500ms`, `2s`, `1m`.", vec![any()], void()),
            func("fps", "(rate: number) => void", "Set the frame rate used by animated terminal output.", vec![num()], void()),
            func("now", "() => number", "Milliseconds since the Unix epoch.", vec![], num()),
        ],
    )
}

fn sys() -> BuiltinEntry {
    ns(
        "Sys",
        "Processes and machine facts.",
        vec![
            func("exec", "(command: string) => string", "Run a shell command and return its standard output.", vec![text()], text()),
            func("execAsync", "(command: string) => void", "Start a shell command in the background.", vec![text()], void()),
            func("pid", "() => number", "Id of the current process.", vec![], num()),
            func("kill", "(pid: number) => boolean", "Terminate a process.", vec![num()], boolean()),
            func("ram", "() => number", "Total memory in megabytes.", vec![], num()),
            ns(
                "cpu",
                "Processor facts.",
                vec![
                    func("cores", "() => number", "Number of logical cores.", vec![], num()),
                    func("usage", "() => number", "Global CPU usage in percent.", vec![], num()),
                    func("model", "() => string", "Processor brand string.", vec![], text()),
                ],
            ),
            ns(
                "os",
                "Operating system facts.",
                vec![
                    func("name", "() => string", "Operating system name.", vec![], text()),
                    func("version", "() => string", "Operating system version.", vec![], text()),
                    func("arch", "() => string", "CPU architecture.", vec![], text()),
                ],
            ),
        ],
    )
}

fn terminal() -> BuiltinEntry {
    ns(
        "Terminal",
        "Formatted terminal output.",
        vec![
            func("progress", "(current: number, total: number, width?: number) => void", "Draw a progress bar.", vec![num(), num()], void()),
            func("banner", "(text: string) => void", "Print text inside a box.", vec![text()], void()),
            func("table", "(rows: any[]) => void", "Print an array of objects or arrays as a table.", vec![ForgeType::array(any())], void()),
            func("tree", "(value: any) => void", "Print nested objects and arrays as a tree.", vec![any()], void()),
            func("spinner", "(label: string, frames?: number) => void", "Animate a spinner for a number of frames.", vec![text()], void()),
            func("form", "(fields: string[]) => any", "Prompt for each field and return an object of answers.", vec![ForgeType::array(text())], any()),
        ],
    )
}

fn file() -> BuiltinEntry {
    let path1 = |name, sig, doc, returns| func(name, sig, doc, vec![text()], returns);
    let path2 = |name, sig, doc| func(name, sig, doc, vec![text(), text()], void());
    ns(
        "File",
        "Filesystem access.",
        vec![
            path1("read", "(path: string) => string", "Read a file as text.", text()),
            path2("write", "(path: string, content: string) => void", "Write text to a file, replacing it."),
            path2("append", "(path: string, content: string) => void", "Append text to a file."),
            path1("delete", "(path: string) => boolean", "Delete a file. Returns false when it did not exist.", boolean()),
            path1("exists", "(path: string) => boolean", "Whether a path exists.", boolean()),
            path1("info", "(path: string) => object", "Size, kind and modification time of a path.", any()),
            path2("copy", "(from: string, to: string) => void", "Copy a file."),
            path2("move", "(from: string, to: string) => void", "Move or rename a file."),
            path1("mkdir", "(path: string) => void", "Create a directory and its parents.", void()),
            path1("list", "(path: string) => string[]", "Names of the entries in a directory.", ForgeType::array(text())),
            path1("readJson", "(path: string) => any", "Read and parse a JSON file.", any()),
            func("writeJson", "(path: string, value: any) => void", "Write a value as pretty JSON.", vec![text(), any()], void()),
            path1("readCsv", "(path: string) => string[][]", "Read a comma separated file into rows.", ForgeType::array(ForgeType::array(text()))),
            func("writeCsv", "(path: string, rows: any[][]) => void", "Write rows as comma separated values.", vec![text(), ForgeType::array(any())], void()),
        ],
    )
}

fn net() -> BuiltinEntry {
    ns(
        "Net",
        "HTTP requests.",
        vec![
            func("get", "(url: string) => any", "GET a URL. JSON responses are parsed, others returned as text.", vec![text()], any()),
            func("post", "(url: string, body: any) => any", "POST a body. Objects and arrays are sent as JSON.", vec![text(), any()], any()),
            func("download", "(url: string, path: string) => void", "Save a response body to a file.", vec![text(), text()], void()),
            func("isOnline", "() => boolean", "Whether a well-known host answers.", vec![], boolean()),
            func("ping", "(url: string) => number", "Round trip of a HEAD request in milliseconds, -1 on failure.", vec![text()], num()),
        ],
    )
}

fn crypto() -> BuiltinEntry {
    let hash = |name, doc| func(name, "(text: string) => string", doc, vec![text()], text());
    ns(
        "Crypto",
        "Hashing, encoding and encryption.",
        vec![
            hash("md5", "MD5 digest as lowercase hex."),
            hash("sha256", "SHA-256 digest as lowercase hex."),
            hash("base64Encode", "Encode text as standard base64."),
            hash("base64Decode", "Decode standard base64 into text."),
            func("generateKey", "(bytes?: number) => string", "Random key as hex, 32 bytes by default.", vec![], text()),
            func("uuid", "() => string", "Random version 4 UUID.", vec![], text()),
            func("encrypt", "(text: string, key: string) => string", "AES-256-GCM encrypt. Any key length is accepted.", vec![text(), text()], text()),
            func("decrypt", "(payload: string, key: string) => string", "Reverse of Crypto.encrypt.", vec![text(), text()], text()),
            func("randomInt", "(min: number, max: number) => number", "Random integer in [min, max].", vec![num(), num()], num()),
        ],
    )
}

fn datetime() -> BuiltinEntry {
    ns(
        "DateTime",
        "Calendar dates.",
        vec![
            func("now", "() => string", "Current local time in RFC 3339 form.", vec![], text()),
            func("format", "(timestamp: number, pattern: string) => string", "Format epoch milliseconds with a strftime pattern.", vec![num(), text()], text()),
            func("timestamp", "() => number", "Milliseconds since the Unix epoch.", vec![], num()),
        ],
    )
}

fn regex() -> BuiltinEntry {
    ns(
        "Regex",
        "Regular expressions.",
        vec![
            func("test", "(pattern: string, text: string) => boolean", "Whether the pattern matches anywhere in text.", vec![text(), text()], boolean()),
            func("match", "(pattern: string, text: string) => string[] | null", "All matches of the pattern.", vec![text(), text()], ForgeType::union([ForgeType::array(text()), ForgeType::Null])),
            func("replace", "(pattern: string, text: string, replacement: string) => string", "Replace every match.", vec![text(), text(), text()], text()),
        ],
    )
}

fn json() -> BuiltinEntry {
    ns(
        "JSON",
        "JSON encoding.",
        vec![
            func("parse", "(text: string) => any", "Parse JSON text.", vec![text()], any()),
            func("stringify", "(value: any, indent?: number) => string", "Serialize a value as JSON.", vec![any()], text()),
        ],
    )
}

fn asynchronous() -> BuiltinEntry {
    ns(
        "Async",
        "Waiting on work.",
        vec![
            func("sleep", "(duration: string | number) => void", "Pause for a duration.", vec![any()], void()),
            func("all", "(values: any[]) => any[]", "Wait for every value and return them in order.", vec![ForgeType::array(any())], ForgeType::array(any())),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_module_has_a_root() {
        let catalog = Catalog::global();
        for module in Module::ALL {
            assert!(catalog.is_root(module.as_str()), "missing {}", module);
        }
        assert!(catalog.is_root(CONSOLE));
    }

    #[test]
    fn test_paths_are_assigned() {
        let entry = Catalog::global().get("Sys.cpu.cores").unwrap();
        assert_eq!(entry.path, "Sys.cpu.cores");
        assert_eq!(entry.module(), Some(Module::Sys));
        assert_eq!(entry.ty(), ForgeType::function(vec![], ForgeType::Number));
    }

    #[test]
    fn test_lookup_outcomes() {
        let catalog = Catalog::global();
        assert!(matches!(catalog.lookup("Math", &["PI"]), Some(Lookup::Found(_))));
        assert!(matches!(
            catalog.lookup("Math", &["nope"]),
            Some(Lookup::Missing { index: 0, .. })
        ));
        assert!(matches!(
            catalog.lookup("Math", &["PI", "x"]),
            Some(Lookup::PastLeaf { index: 1, .. })
        ));
        assert!(catalog.lookup("dog", &[]).is_none());
    }

    #[test]
    fn test_known_names_include_members() {
        let names = Catalog::global().known_names();
        assert!(names.contains(&"console"));
        assert!(names.contains(&"sqrt"));
        assert!(names.contains(&"JSON"));
    }
}
