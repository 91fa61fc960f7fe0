//! Language-surface tests: control flow, functions and closures, classes,
//! pattern matching, generators, exceptions.

use mneme::{run, Ctx, RunOutcome};

/// Runs source and returns everything it printed.
fn run_code(code: &str) -> String {
    let mut ctx = Ctx::default();
    match run(code, &mut ctx) {
        Ok(RunOutcome::Complete(_)) => ctx.output().to_string(),
        Ok(RunOutcome::Suspended) => panic!("unexpected suspension"),
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
fn arithmetic_and_precedence() {
    assert_eq!(run_code("print(2 + 3 * 4, (2 + 3) * 4, 2 ** 10, 7 // 2, 7 % 2, 7 / 2)"), "14 20 1024 3 1 3.5\n");
    assert_eq!(run_code("print(-7 // 2, -7 % 2)"), "-4 1\n");
}

#[test]
fn big_integer_promotion() {
    assert_eq!(run_code("print(2 ** 100)"), "1267650600228229401496703205376\n");
    assert_eq!(run_code("print(2 ** 100 // 2 ** 90)"), "1024\n");
}

#[test]
fn truthiness_and_short_circuit() {
    let code = "
print(0 or 'fallback')
print('' and 'never')
print(1 and 2)
print(not [])
";
    assert_eq!(run_code(code), "fallback\n\n2\nTrue\n");
}

#[test]
fn comparison_chains() {
    assert_eq!(run_code("print(1 < 2 < 3, 1 < 2 > 3, 'a' < 'b' <= 'b')"), "True False True\n");
}

#[test]
fn while_loop_with_else_and_break() {
    let code = "
total = 0
i = 0
while i < 10:
    i += 1
    if i == 4:
        break
    total += i
else:
    total = -1
print(total, i)
";
    assert_eq!(run_code(code), "6 4\n");
}

#[test]
fn for_else_runs_without_break() {
    let code = "
hits = []
for x in range(3):
    hits.append(x)
else:
    hits.append('done')
print(hits)
";
    assert_eq!(run_code(code), "[0, 1, 2, 'done']\n");
}

#[test]
fn containers_alias_not_copy() {
    let code = "
a = [1, 2]
b = a
b.append(3)
print(a)
d = {'k': []}
e = d
e['k'].append(1)
print(d)
";
    assert_eq!(run_code(code), "[1, 2, 3]\n{'k': [1]}\n");
}

#[test]
fn destructuring_with_star() {
    let code = "
first, *middle, last = [1, 2, 3, 4, 5]
print(first, middle, last)
a, b = b, a = 1, 2
print(a, b)
";
    // the double assignment binds left to right
    assert_eq!(run_code(code), "1 [2, 3, 4] 5\n2 1\n");
}

#[test]
fn closures_observe_rebinding() {
    // the closure-rebinding law: calls that rebind a captured name are
    // visible to subsequent calls of the closure
    let code = "
def counter():
    n = 0
    def inc():
        nonlocal n
        n += 1
        return n
    return inc
c = counter()
print(c(), c(), c())
";
    assert_eq!(run_code(code), "1 2 3\n");
}

#[test]
fn global_declaration() {
    let code = "
x = 1
def bump():
    global x
    x = x + 10
bump()
bump()
print(x)
";
    assert_eq!(run_code(code), "21\n");
}

#[test]
fn default_args_evaluated_at_definition() {
    let code = "
base = 10
def add(a, b=base):
    return a + b
base = 99
print(add(1), add(1, 2))
";
    assert_eq!(run_code(code), "11 3\n");
}

#[test]
fn args_kwargs_binding() {
    let code = "
def f(a, b=2, *rest, sep='-', **extra):
    return str(a) + sep + str(b) + sep + str(len(rest)) + sep + str(sorted(extra.keys()))
print(f(1))
print(f(1, 3, 4, 5, sep='+', x=1, y=2))
";
    assert_eq!(run_code(code), "1-2-0-[]\n1+3+2+['x', 'y']\n");
}

#[test]
fn lambda_and_sorted_key() {
    let code = "
words = ['bbb', 'a', 'cc']
print(sorted(words, key=lambda w: len(w)))
print(sorted([3, 1, 2], reverse=True))
";
    assert_eq!(run_code(code), "['a', 'cc', 'bbb']\n[3, 2, 1]\n");
}

#[test]
fn decorators_apply_bottom_up() {
    let code = "
def exclaim(f):
    def wrapper(x):
        return f(x) + '!'
    return wrapper

def shout(f):
    def wrapper(x):
        return f(x).upper()
    return wrapper

@exclaim
@shout
def greet(name):
    return 'hi ' + name

print(greet('ada'))
";
    assert_eq!(run_code(code), "HI ADA!\n");
}

#[test]
fn comprehension_scopes_do_not_leak() {
    let code = "
x = 'outer'
squares = [x * x for x in range(4)]
print(squares, x)
pairs = {k: v for k, v in [('a', 1), ('b', 2)]}
print(pairs)
evens = {n for n in range(6) if n % 2 == 0}
print(sorted(evens))
";
    assert_eq!(
        run_code(code),
        "[0, 1, 4, 9] outer\n{'a': 1, 'b': 2}\n[0, 2, 4]\n"
    );
}

#[test]
fn nested_comprehension() {
    assert_eq!(
        run_code("print([(a, b) for a in range(2) for b in range(2) if a != b])"),
        "[(0, 1), (1, 0)]\n"
    );
}

#[test]
fn fibonacci_generator_scenario() {
    // infinite generator, materialized up to the internal cap, sliced
    let code = "
def f():
    x = [0, 1]
    while True:
        x[0], x[1] = x[1], x[0] + x[1]
        yield x[0]
print(list(iter(f()))[:7])
";
    assert_eq!(run_code(code), "[1, 1, 2, 3, 5, 8, 13]\n");
}

#[test]
fn generator_function_and_next() {
    let code = "
def gen():
    yield 1
    yield 2
it = iter(gen())
print(next(it), next(it), next(it, 'done'))
";
    assert_eq!(run_code(code), "1 2 done\n");
}

#[test]
fn next_on_raw_generator_is_rejected() {
    let err = run_err("def g():\n    yield 1\nnext(g())");
    assert_eq!(err.kind, "TypeError");
    assert!(err.message.contains("iter()"));
}

#[test]
fn generator_expression_materializes() {
    assert_eq!(run_code("print(sum(x * x for x in range(5)))"), "30\n");
    assert_eq!(run_code("print(list(x + 1 for x in [1, 2]))"), "[2, 3]\n");
}

#[test]
fn dict_items_sorted_scenario() {
    assert_eq!(
        run_code("print(sorted({'b': 2, 'a': 1}.items()))"),
        "[('a', 1), ('b', 2)]\n"
    );
}

#[test]
fn classes_and_instances() {
    let code = "
class Point:
    def __init__(self, x, y):
        self.x = x
        self.y = y

    def magnitude(self):
        return (self.x ** 2 + self.y ** 2) ** 0.5

p = Point(3, 4)
print(p.x, p.y, p.magnitude())
p.x = 6
print(p.x)
";
    assert_eq!(run_code(code), "3 4 5.0\n6\n");
}

#[test]
fn inheritance_dfs_and_super() {
    let code = "
class A:
    def name(self):
        return 'A'

class B(A):
    def name(self):
        return 'B>' + super().name()

class C(A):
    def name(self):
        return 'C'

class D(B, C):
    pass

print(D().name())
print(isinstance(D(), A), issubclass(D, C))
";
    // DFS MRO: D -> B -> A, so B's super() resolves to A, not C
    assert_eq!(run_code(code), "B>A\nTrue True\n");
}

#[test]
fn dunder_protocols() {
    let code = "
class Box:
    def __init__(self, items):
        self.items = items
    def __len__(self):
        return len(self.items)
    def __getitem__(self, i):
        return self.items[i]
    def __contains__(self, x):
        return x in self.items
    def __str__(self):
        return 'Box(' + str(len(self.items)) + ')'
    def __eq__(self, other):
        return self.items == other.items

b = Box([1, 2, 3])
print(len(b), b[1], 2 in b, 9 in b)
print(b)
print(b == Box([1, 2, 3]), bool(Box([])))
";
    assert_eq!(run_code(code), "3 2 True False\nBox(3)\nTrue False\n");
}

#[test]
fn instance_iteration_protocol() {
    let code = "
class CountDown:
    def __init__(self, n):
        self.n = n
    def __iter__(self):
        return self
    def __next__(self):
        if self.n == 0:
            raise StopIteration
        self.n -= 1
        return self.n + 1

print(list(CountDown(3)))
print([x * 10 for x in CountDown(2)])
";
    assert_eq!(run_code(code), "[3, 2, 1]\n[20, 10]\n");
}

#[test]
fn callable_instances() {
    let code = "
class Adder:
    def __init__(self, n):
        self.n = n
    def __call__(self, x):
        return x + self.n

add5 = Adder(5)
print(add5(10), callable(add5))
";
    assert_eq!(run_code(code), "15 True\n");
}

#[test]
fn try_except_else_finally_paths() {
    let code = "
log = []
def attempt(x):
    try:
        y = 10 // x
    except ZeroDivisionError as e:
        log.append('caught')
        return 'err'
    else:
        log.append('else')
        return y
    finally:
        log.append('finally')

print(attempt(2), attempt(0))
print(log)
";
    assert_eq!(
        run_code(code),
        "5 err\n['else', 'finally', 'caught', 'finally']\n"
    );
}

#[test]
fn finally_runs_on_break_and_continue() {
    let code = "
log = []
for i in range(4):
    try:
        if i == 1:
            continue
        if i == 3:
            break
        log.append(i)
    finally:
        log.append('f')
print(log)
";
    assert_eq!(run_code(code), "[0, 'f', 'f', 2, 'f', 'f']\n");
}

#[test]
fn exception_hierarchy_matching() {
    let code = "
try:
    {}['missing']
except LookupError as e:
    print('lookup:', e)

try:
    [1][5]
except Exception:
    print('any')
";
    assert_eq!(run_code(code), "lookup: 'missing'\nany\n");
}

#[test]
fn user_exception_classes() {
    let code = "
class ParseFailure(ValueError):
    pass

try:
    raise ParseFailure('bad token')
except ValueError as e:
    print('caught', e)

try:
    raise ParseFailure('again')
except KeyError:
    print('wrong handler')
except ParseFailure:
    print('exact handler')
";
    assert_eq!(run_code(code), "caught bad token\nexact handler\n");
}

#[test]
fn bare_raise_rethrows() {
    let code = "
try:
    try:
        raise ValueError('inner')
    except ValueError:
        raise
except ValueError as e:
    print('outer saw', e)
";
    assert_eq!(run_code(code), "outer saw inner\n");
}

#[test]
fn uncaught_exception_reaches_host_with_line() {
    let err = run_err("x = 1\ny = x + 'no'\n");
    assert_eq!(err.kind, "TypeError");
    assert!(err.message.contains("(line 2)"), "got: {}", err.message);
}

#[test]
fn with_statement_on_instances() {
    let code = "
log = []
class Guard:
    def __enter__(self):
        log.append('enter')
        return 'resource'
    def __exit__(self, exc_type, exc, tb):
        log.append('exit')
        return False

with Guard() as r:
    log.append(r)
print(log)
";
    assert_eq!(run_code(code), "['enter', 'resource', 'exit']\n");
}

#[test]
fn with_exit_can_suppress() {
    let code = "
class Swallow:
    def __enter__(self):
        return self
    def __exit__(self, exc_type, exc, tb):
        return True

with Swallow():
    raise ValueError('gone')
print('survived')
";
    assert_eq!(run_code(code), "survived\n");
}

#[test]
fn match_statement_full_pattern_alphabet() {
    let code = "
def describe(value):
    match value:
        case 0:
            return 'zero'
        case [x, y]:
            return 'pair:' + str(x + y)
        case [first, *rest]:
            return 'head:' + str(first) + ' tail:' + str(len(rest))
        case {'kind': k, **extra}:
            return 'kind:' + k + ' extra:' + str(len(extra))
        case str() as s if len(s) > 3:
            return 'long str'
        case str():
            return 'short str'
        case None:
            return 'none'
        case 1 | 2 | 3:
            return 'small'
        case _:
            return 'other'

print(describe(0))
print(describe([2, 3]))
print(describe([1, 2, 3, 4]))
print(describe({'kind': 'x', 'a': 1, 'b': 2}))
print(describe('hello'))
print(describe('hi'))
print(describe(None))
print(describe(2))
print(describe(9.5))
";
    assert_eq!(
        run_code(code),
        "zero\npair:5\nhead:1 tail:3\nkind:x extra:2\nlong str\nshort str\nnone\nsmall\nother\n"
    );
}

#[test]
fn match_class_patterns() {
    let code = "
class Point:
    __match_args__ = ('x', 'y')
    def __init__(self, x, y):
        self.x = x
        self.y = y

def where(p):
    match p:
        case Point(0, 0):
            return 'origin'
        case Point(0, y=y):
            return 'y axis at ' + str(y)
        case Point(x, y):
            return str(x) + ',' + str(y)

print(where(Point(0, 0)))
print(where(Point(0, 5)))
print(where(Point(2, 3)))
";
    assert_eq!(run_code(code), "origin\ny axis at 5\n2,3\n");
}

#[test]
fn fstrings_with_conversions_and_specs() {
    let code = "
name = 'ada'
pi = 3.14159
print(f'{name!r} {name.upper()} {pi:.2f} {42:>5} {255:#x}')
width = 6
print(f'{pi:{width}.1f}')
print(f'{name=}')
";
    assert_eq!(run_code(code), "'ada' ADA 3.14    42 0xff\n   3.1\nname='ada'\n");
}

#[test]
fn percent_formatting() {
    assert_eq!(
        run_code("print('%s scored %d (%.1f%%)' % ('ada', 9, 87.25))"),
        "ada scored 9 (87.2%)\n"
    );
}

#[test]
fn slicing() {
    let code = "
xs = [0, 1, 2, 3, 4, 5]
print(xs[1:4], xs[::2], xs[::-1], xs[-2:])
s = 'hello'
print(s[1:3], s[::-1])
xs[1:3] = [9]
print(xs)
del xs[0:2]
print(xs)
";
    assert_eq!(
        run_code(code),
        "[1, 2, 3] [0, 2, 4] [5, 4, 3, 2, 1, 0] [4, 5]\nel olleh\n[0, 9, 3, 4, 5]\n[3, 4, 5]\n"
    );
}

#[test]
fn string_method_coverage() {
    let code = "
s = '  Hello, World  '
print(s.strip())
print('a,b,,c'.split(','))
print('-'.join(['x', 'y', 'z']))
print('hello world'.title().swapcase())
print('42'.zfill(5), 'hi'.center(6, '*'))
print('mississippi'.count('ss'), 'mississippi'.rfind('ss'))
print('tab\\tend'.expandtabs(4))
";
    assert_eq!(
        run_code(code),
        "Hello, World\n['a', 'b', '', 'c']\nx-y-z\nhELLO wORLD\n00042 **hi**\n2 5\ntab end\n"
    );
}

#[test]
fn walrus_operator() {
    let code = "
if (n := 10) > 5:
    print(n)
data = [y := 3, y ** 2]
print(data, y)
";
    assert_eq!(run_code(code), "10\n[3, 9] 3\n");
}

#[test]
fn ternary_and_unpacking_in_calls() {
    let code = "
args = [1, 2, 3]
print(*args, sep='|')
kw = {'end': '!\\n'}
print('done', **kw)
print('big' if max(args) > 2 else 'small')
";
    assert_eq!(run_code(code), "1|2|3\ndone!\nbig\n");
}

#[test]
fn builtin_coverage() {
    let code = "
print(abs(-3), divmod(7, 2), pow(2, 5), pow(3, 4, 5))
print(min([4, 2, 9]), max(1, 7, 3), sum([1.5, 2.5]))
print(any([0, '', 3]), all([1, 'x']), all([1, 0]))
print(list(zip('ab', [1, 2, 3])))
print(list(enumerate('ab', start=1)))
print(list(map(lambda x: x * 2, [1, 2])), list(filter(lambda x: x > 1, [0, 1, 2, 3])))
print(list(reversed([1, 2, 3])), chr(97), ord('a'), hex(255), bin(5), oct(8))
print(round(2.675, 2), round(3.5), int('ff', 16), float('2.5'), bool([]))
";
    assert_eq!(
        run_code(code),
        "3 (3, 1) 32 1\n2 7 4.0\nTrue True False\n[('a', 1), ('b', 2)]\n[(1, 'a'), (2, 'b')]\n[2, 4] [2, 3]\n[3, 2, 1] a 97 0xff 0b101 0o10\n2.68 4 255 2.5 False\n"
    );
}

#[test]
fn set_operations() {
    let code = "
a = {1, 2, 3}
b = {2, 3, 4}
print(sorted(a | b), sorted(a & b), sorted(a - b), sorted(a ^ b))
a.add(9)
a.discard(1)
print(sorted(a), a.issuperset({2, 9}))
print(frozenset([1, 2]) == frozenset([2, 1]))
";
    assert_eq!(
        run_code(code),
        "[1, 2, 3, 4] [2, 3] [1] [1, 4]\n[2, 3, 9] True\nTrue\n"
    );
}

#[test]
fn recursion_works_within_limit() {
    let code = "
def fact(n):
    return 1 if n <= 1 else n * fact(n - 1)
print(fact(10))
";
    assert_eq!(run_code(code), "3628800\n");
}

#[test]
fn yield_from_flattens() {
    let code = "
def inner():
    yield 1
    yield 2
def outer():
    yield 0
    yield from inner()
    yield 3
print(list(iter(outer())))
";
    assert_eq!(run_code(code), "[0, 1, 2, 3]\n");
}
