//! Import resolution and the stdlib module surface.

use mneme::{run, Ctx, CtxOptions, MemFs};

fn run_code(code: &str) -> String {
    let mut ctx = Ctx::default();
    match run(code, &mut ctx) {
        Ok(_) => ctx.output().to_string(),
        Err(err) => panic!("run failed: {err}\noutput so far: {}", ctx.output()),
    }
}

fn run_err(code: &str) -> mneme::Error {
    let mut ctx = Ctx::default();
    match run(code, &mut ctx) {
        Err(err) => err,
        Ok(_) => panic!("expected an error"),
    }
}

#[test]
fn counter_most_common_scenario() {
    assert_eq!(
        run_code("from collections import Counter\nprint(Counter('abracadabra').most_common(1))"),
        "[('a', 5)]\n"
    );
}

#[test]
fn counter_arithmetic_surface() {
    let code = "
from collections import Counter
c = Counter(['x', 'y', 'x'])
c.update(['x', 'z'])
print(c['x'], c['y'], c['missing'])
print(sorted(c.elements()))
print(c.total())
";
    assert_eq!(run_code(code), "3 1 0\n['x', 'x', 'x', 'y', 'z']\n5\n");
}

#[test]
fn re_findall_scenario() {
    assert_eq!(
        run_code("import re\nprint(re.findall(r'\\d+', 'a1b22c333'))"),
        "['1', '22', '333']\n"
    );
}

#[test]
fn re_surface() {
    let code = "
import re
m = re.search(r'(\\w+)@(\\w+)', 'mail me at ada@lovelace today')
print(m.group(0), m.group(1), m.group(2))
print(m.start(), m.end())
print(re.sub(r'\\s+', '-', 'a  b   c'))
print(re.split(r',\\s*', 'x, y,z'))
pattern = re.compile(r'[A-Z]\\w+')
print(pattern.findall('Ada wrote Notes on the Engine'))
print(re.match(r'\\d+', 'abc123'))
";
    assert_eq!(
        run_code(code),
        "ada@lovelace ada lovelace\n11 23\na-b-c\n['x', 'y', 'z']\n['Ada', 'Notes', 'Engine']\nNone\n"
    );
}

#[test]
fn json_round_trip_preserves_order() {
    let code = "
import json
data = json.loads('{\"b\": 1, \"a\": [1, 2.5, null, true]}')
print(data['b'], data['a'])
print(json.dumps(data))
print(json.dumps({'z': 1, 'a': 2}, sort_keys=True))
";
    assert_eq!(
        run_code(code),
        "1 [1, 2.5, None, True]\n{\"b\": 1, \"a\": [1, 2.5, null, true]}\n{\"a\": 2, \"z\": 1}\n"
    );
}

#[test]
fn json_rejects_bad_input() {
    let err = run_err("import json\njson.loads('{not json')");
    assert_eq!(err.kind, "ValueError");
}

#[test]
fn hashlib_digests() {
    let code = "
import hashlib
print(hashlib.sha256('abc').hexdigest())
h = hashlib.md5()
h.update('hello')
print(h.hexdigest())
print(hashlib.new('sha1', 'abc').hexdigest())
";
    assert_eq!(
        run_code(code),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad\n\
         5d41402abc4b2a76b9719d911017c592\n\
         a9993e364706816aba3e25717850c26c9cd0d89d\n"
    );
}

#[test]
fn hmac_matches_rfc_vector() {
    let code = "
import hmac
import hashlib
mac = hmac.new('Jefe', 'what do ya want for nothing?', hashlib.sha256)
print(mac.hexdigest())
print(hmac.compare_digest(mac.hexdigest(), mac.hexdigest()))
print(hmac.compare_digest('abc', 'abd'))
";
    assert_eq!(
        run_code(code),
        "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843\nTrue\nFalse\n"
    );
}

#[test]
fn base64_round_trip() {
    let code = "
import base64
encoded = base64.b64encode('hello world')
print(encoded)
print(base64.b64decode(encoded))
";
    assert_eq!(run_code(code), "aGVsbG8gd29ybGQ=\nhello world\n");
}

#[test]
fn math_surface() {
    let code = "
import math
print(math.sqrt(16), math.floor(2.7), math.ceil(2.1))
print(math.gcd(12, 18), math.factorial(6))
print(math.isclose(0.1 + 0.2, 0.3))
print(math.inf > 10 ** 100, math.isnan(math.nan))
";
    assert_eq!(
        run_code(code),
        "4.0 2 3\n6 720\nTrue\nTrue True\n"
    );
}

#[test]
fn string_module_constants() {
    assert_eq!(
        run_code("import string\nprint(string.digits, string.capwords('hello there world'))"),
        "0123456789 Hello There World\n"
    );
}

#[test]
fn from_import_and_aliases() {
    let code = "
from math import sqrt, pi as PI
import math as m
print(sqrt(4.0), PI == m.pi)
";
    assert_eq!(run_code(code), "2.0 True\n");
}

#[test]
fn filesystem_modules_execute_once_and_cache() {
    let fs = MemFs::with_files([
        (
            "helper.py",
            "print('loading helper')\n\ndef double(x):\n    return x * 2\n\nLIMIT = 10\n",
        ),
        ("pkg.py", "import helper\nvalue = helper.double(21)\n"),
    ]);
    let mut ctx = Ctx::new(CtxOptions {
        filesystem: Some(Box::new(fs)),
        ..CtxOptions::default()
    });
    let source = "
import helper
import pkg
from helper import LIMIT
print(helper.double(5), pkg.value, LIMIT)
";
    run(source, &mut ctx).unwrap();
    // the module body ran exactly once despite three import paths
    assert_eq!(ctx.output(), "loading helper\n10 42 10\n");
}

#[test]
fn filesystem_module_errors_are_wrapped() {
    let fs = MemFs::with_files([("broken.py", "def f(:\n")]);
    let mut ctx = Ctx::new(CtxOptions {
        filesystem: Some(Box::new(fs)),
        ..CtxOptions::default()
    });
    let err = run("import broken", &mut ctx).unwrap_err();
    assert_eq!(err.kind, "SyntaxError");
    assert!(err.message.contains("error in 'broken'"));

    let fs = MemFs::with_files([("explodes.py", "raise ValueError('at import time')\n")]);
    let mut ctx = Ctx::new(CtxOptions {
        filesystem: Some(Box::new(fs)),
        ..CtxOptions::default()
    });
    let err = run("import explodes", &mut ctx).unwrap_err();
    assert_eq!(err.kind, "ImportError");
    assert!(err.message.contains("error in 'explodes'"));
}

#[test]
fn unknown_module_hints() {
    let err = run_err("import urllib");
    assert_eq!(err.kind, "ModuleNotFoundError");
    assert!(err.message.contains("requests"));

    let err = run_err("import sys");
    assert_eq!(err.kind, "ModuleNotFoundError");
    assert!(err.message.contains("os"));

    let err = run_err("import numpy");
    assert_eq!(err.kind, "ModuleNotFoundError");
    assert!(err.message.contains("No module named 'numpy'"));
}

#[test]
fn missing_name_in_module_is_import_error() {
    let err = run_err("from math import does_not_exist");
    assert_eq!(err.kind, "ImportError");
    assert!(err.message.contains("does_not_exist"));
}

#[test]
fn host_module_mapping_protocol() {
    let module = mneme::Value::module(
        "tools",
        vec![
            ("version".to_string(), mneme::Value::str("1.2.3")),
            (
                "triple".to_string(),
                mneme::Value::host_fn("triple", |args| match args.first() {
                    Some(mneme::Value::Int(i)) => Ok(mneme::Value::Int(i * 3)),
                    _ => Err("expected an int".to_string()),
                }),
            ),
        ],
    );
    let mut modules = indexmap::IndexMap::new();
    modules.insert("tools".to_string(), mneme::HostModule::Value(module));
    let mut ctx = Ctx::new(CtxOptions {
        modules,
        ..CtxOptions::default()
    });
    run("import tools\nprint(tools.version, tools.triple(14))", &mut ctx).unwrap();
    assert_eq!(ctx.output(), "1.2.3 42\n");
}

#[test]
fn datetime_fromtimestamp() {
    let code = "
import datetime
dt = datetime.datetime.fromtimestamp(1699900000)
print(dt.year, dt.month, dt.day)
print(dt.strftime('%Y-%m-%d'))
delta = datetime.timedelta(days=1, hours=6)
print(delta.total_seconds())
";
    assert_eq!(run_code(code), "2023 11 13\n2023-11-13\n108000.0\n");
}

#[test]
fn random_module_is_seed_stable() {
    let code = "
import random
random.seed(42)
first = [random.randint(1, 6) for _ in range(3)]
random.seed(42)
second = [random.randint(1, 6) for _ in range(3)]
print(first == second)
print(all(1 <= x <= 6 for x in first))
";
    assert_eq!(run_code(code), "True\nTrue\n");
}
