//! The operator catalog: every core and standard library operator.
//!
//! Each table is grouped by library. The registry is built from these tables
//! once; nothing here is mutated at runtime.

use crate::operator::{Category as C, OperatorMeta as Op, StdModule as M};

const UNBOUNDED: Option<usize> = None;

const fn up_to(n: usize) -> Option<usize> {
    Some(n)
}

// ============================================================================
// core
// ============================================================================

pub(crate) const CORE: &[Op] = &[
    // Arithmetic
    Op::core("+", C::Arithmetic, 2, UNBOUNDED, "Sum of all arguments"),
    Op::core("-", C::Arithmetic, 1, up_to(2), "Subtraction, or negation with one argument"),
    Op::core("*", C::Arithmetic, 2, UNBOUNDED, "Product of all arguments"),
    Op::core("/", C::Arithmetic, 2, up_to(2), "Division"),
    Op::core("%", C::Arithmetic, 2, up_to(2), "Remainder, following the dividend's sign"),
    // Comparison
    Op::core("=", C::Comparison, 2, up_to(2), "Structural equality"),
    Op::core("!=", C::Comparison, 2, up_to(2), "Structural inequality"),
    Op::core("<", C::Comparison, 2, up_to(2), "Less than"),
    Op::core(">", C::Comparison, 2, up_to(2), "Greater than"),
    Op::core("<=", C::Comparison, 2, up_to(2), "Less than or equal"),
    Op::core(">=", C::Comparison, 2, up_to(2), "Greater than or equal"),
    // Logic
    Op::core("and", C::Logic, 2, UNBOUNDED, "Short-circuit conjunction"),
    Op::core("or", C::Logic, 2, UNBOUNDED, "Short-circuit disjunction"),
    Op::core("not", C::Logic, 1, up_to(1), "Logical negation"),
    // Control
    Op::core("if", C::Control, 2, up_to(3), "Conditional with optional else branch"),
    Op::core("when", C::Control, 2, up_to(2), "Evaluates the body when the condition holds"),
    Op::core("do", C::Control, 1, UNBOUNDED, "Evaluates in order, returning the last value"),
    Op::core("let", C::Control, 2, up_to(2), "Binds lexical locals for the body"),
    Op::core("fn", C::Control, 2, up_to(2), "Lambda literal"),
    // Effects
    Op::core("set", C::Effect, 2, up_to(2), "Sets a bound field"),
    Op::core("increment", C::Effect, 1, up_to(2), "Increments a bound field"),
    Op::core("decrement", C::Effect, 1, up_to(2), "Decrements a bound field"),
    Op::core("emit", C::Effect, 1, up_to(2), "Emits an event with an optional payload"),
    Op::core("persist", C::Effect, 2, up_to(3), "Creates, updates or deletes an entity"),
    Op::core("fetch", C::Effect, 1, up_to(2), "Queries entities"),
    Op::core("navigate", C::Effect, 1, up_to(2), "Navigates to a route"),
    Op::core("notify", C::Effect, 1, up_to(2), "Shows a notification"),
    Op::core("call-service", C::Effect, 2, up_to(3), "Calls an external service method"),
    Op::core("render-ui", C::Effect, 2, up_to(3), "Renders a pattern into a UI slot"),
    Op::core("spawn", C::Effect, 1, up_to(2), "Spawns an entity"),
    Op::core("despawn", C::Effect, 0, up_to(1), "Despawns an entity"),
    Op::core("log", C::Effect, 1, up_to(2), "Writes a log message"),
];

// ============================================================================
// math library
// ============================================================================

pub(crate) const MATH: &[Op] = &[
    Op::std(M::Math, "math/abs", &["value"], 1, up_to(1), "Absolute value"),
    Op::std(M::Math, "math/min", &["...values"], 1, UNBOUNDED, "Smallest argument"),
    Op::std(M::Math, "math/max", &["...values"], 1, UNBOUNDED, "Largest argument"),
    Op::std(M::Math, "math/floor", &["value", "decimals"], 1, up_to(2), "Rounds down"),
    Op::std(M::Math, "math/ceil", &["value", "decimals"], 1, up_to(2), "Rounds up"),
    Op::std(M::Math, "math/round", &["value", "decimals"], 1, up_to(2), "Rounds half away from zero")
        .with_example(r#"["math/round", 3.14159, 2]"#),
    Op::std(M::Math, "math/trunc", &["value"], 1, up_to(1), "Drops the fractional part"),
    Op::std(M::Math, "math/clamp", &["value", "min", "max"], 3, up_to(3), "Constrains a value to [min, max], bounds inclusive")
        .with_example(r#"["math/clamp", 150, 0, 100]"#),
    Op::std(M::Math, "math/mod", &["a", "b"], 2, up_to(2), "Remainder following the dividend's sign"),
    Op::std(M::Math, "math/pow", &["base", "exp"], 2, up_to(2), "Exponentiation"),
    Op::std(M::Math, "math/sqrt", &["value"], 1, up_to(1), "Square root"),
    Op::std(M::Math, "math/sign", &["value"], 1, up_to(1), "-1, 0 or 1"),
    Op::std(M::Math, "math/lerp", &["a", "b", "t"], 3, up_to(3), "Linear interpolation a + (b - a) * t"),
    Op::std(M::Math, "math/map", &["value", "inMin", "inMax", "outMin", "outMax"], 5, up_to(5), "Rescales a value from one range to another")
        .with_example(r#"["math/map", 5, 0, 10, 0, 100]"#),
    Op::std(M::Math, "math/random", &[], 0, up_to(0), "Random number in [0, 1)"),
    Op::std(M::Math, "math/randomInt", &["min", "max"], 2, up_to(2), "Random integer in [min, max], both inclusive"),
    Op::std(M::Math, "math/default", &["value", "fallback"], 2, up_to(2), "Fallback for null or NaN"),
];

// ============================================================================
// str library
// ============================================================================

pub(crate) const STR: &[Op] = &[
    Op::std(M::Str, "str/len", &["s"], 1, up_to(1), "Length in characters"),
    Op::std(M::Str, "str/upper", &["s"], 1, up_to(1), "Uppercase"),
    Op::std(M::Str, "str/lower", &["s"], 1, up_to(1), "Lowercase"),
    Op::std(M::Str, "str/trim", &["s"], 1, up_to(1), "Strips surrounding whitespace"),
    Op::std(M::Str, "str/concat", &["...strings"], 0, UNBOUNDED, "Concatenates all arguments"),
    Op::std(M::Str, "str/split", &["s", "separator"], 2, up_to(2), "Splits into a list"),
    Op::std(M::Str, "str/join", &["items", "separator"], 2, up_to(2), "Joins a list"),
    Op::std(M::Str, "str/slice", &["s", "start", "end"], 2, up_to(3), "Substring by character index"),
    Op::std(M::Str, "str/replace", &["s", "search", "replacement"], 3, up_to(3), "Replaces the first occurrence"),
    Op::std(M::Str, "str/replaceAll", &["s", "search", "replacement"], 3, up_to(3), "Replaces every literal occurrence"),
    Op::std(M::Str, "str/includes", &["s", "search"], 2, up_to(2), "Substring test"),
    Op::std(M::Str, "str/startsWith", &["s", "prefix"], 2, up_to(2), "Prefix test"),
    Op::std(M::Str, "str/endsWith", &["s", "suffix"], 2, up_to(2), "Suffix test"),
    Op::std(M::Str, "str/indexOf", &["s", "search"], 2, up_to(2), "Character index of the first match, or -1"),
    Op::std(M::Str, "str/padStart", &["s", "length", "fill"], 2, up_to(3), "Pads on the left"),
    Op::std(M::Str, "str/padEnd", &["s", "length", "fill"], 2, up_to(3), "Pads on the right"),
    Op::std(M::Str, "str/repeat", &["s", "count"], 2, up_to(2), "Repeats a string"),
    Op::std(M::Str, "str/reverse", &["s"], 1, up_to(1), "Reverses characters"),
    Op::std(M::Str, "str/truncate", &["s", "length", "suffix"], 2, up_to(3), "Shortens to length, ending with suffix")
        .with_example(r#"["str/truncate", "Hello world", 8]"#),
    Op::std(M::Str, "str/capitalize", &["s"], 1, up_to(1), "Uppercases the first character"),
    Op::std(M::Str, "str/camelCase", &["s"], 1, up_to(1), "camelCase"),
    Op::std(M::Str, "str/kebabCase", &["s"], 1, up_to(1), "kebab-case"),
    Op::std(M::Str, "str/snakeCase", &["s"], 1, up_to(1), "snake_case"),
    Op::std(M::Str, "str/titleCase", &["s"], 1, up_to(1), "Title Case"),
    Op::std(M::Str, "str/template", &["template", "values"], 2, up_to(2), "Fills {placeholders} from an object")
        .with_example(r#"["str/template", "Hi {name}", {"name": "Ada"}]"#),
    Op::std(M::Str, "str/matches", &["s", "pattern"], 2, up_to(2), "Regular expression test"),
    Op::std(M::Str, "str/default", &["value", "fallback"], 2, up_to(2), "Fallback for null or empty string"),
];

// ============================================================================
// array library
// ============================================================================

pub(crate) const ARRAY: &[Op] = &[
    Op::std(M::Array, "array/len", &["items"], 1, up_to(1), "Number of elements"),
    Op::std(M::Array, "array/first", &["items"], 1, up_to(1), "First element"),
    Op::std(M::Array, "array/last", &["items"], 1, up_to(1), "Last element"),
    Op::std(M::Array, "array/nth", &["items", "index"], 2, up_to(2), "Element at index; negative counts from the end"),
    Op::std(M::Array, "array/slice", &["items", "start", "end"], 2, up_to(3), "Sub-list"),
    Op::std(M::Array, "array/concat", &["...lists"], 0, UNBOUNDED, "Concatenates lists"),
    Op::std(M::Array, "array/append", &["items", "item"], 2, up_to(2), "New list with item at the end"),
    Op::std(M::Array, "array/prepend", &["items", "item"], 2, up_to(2), "New list with item at the start"),
    Op::std(M::Array, "array/insert", &["items", "index", "item"], 3, up_to(3), "New list with item inserted"),
    Op::std(M::Array, "array/remove", &["items", "index"], 2, up_to(2), "New list without the element at index"),
    Op::std(M::Array, "array/removeItem", &["items", "item"], 2, up_to(2), "New list without elements equal to item"),
    Op::std(M::Array, "array/includes", &["items", "item"], 2, up_to(2), "Membership test"),
    Op::std(M::Array, "array/indexOf", &["items", "item"], 2, up_to(2), "Index of item, or -1"),
    Op::std(M::Array, "array/reverse", &["items"], 1, up_to(1), "New reversed list"),
    Op::std(M::Array, "array/sort", &["items", "key", "order"], 1, up_to(3), "New sorted list, optionally by key and order"),
    Op::std(M::Array, "array/unique", &["items"], 1, up_to(1), "Removes duplicates keeping first-seen order"),
    Op::std(M::Array, "array/flatten", &["items"], 1, up_to(1), "Flattens one level"),
    Op::std(M::Array, "array/range", &["start", "end", "step"], 2, up_to(3), "Numbers from start (inclusive) to end (exclusive)"),
    Op::std(M::Array, "array/take", &["items", "n"], 2, up_to(2), "First n elements"),
    Op::std(M::Array, "array/drop", &["items", "n"], 2, up_to(2), "All but the first n elements"),
    Op::std(M::Array, "array/shuffle", &["items"], 1, up_to(1), "New list in random order"),
    Op::std(M::Array, "array/groupBy", &["items", "key"], 2, up_to(2), "Object of stringified key to elements"),
    Op::std(M::Array, "array/sum", &["items", "key"], 1, up_to(2), "Sum of numeric values"),
    Op::std(M::Array, "array/avg", &["items", "key"], 1, up_to(2), "Mean of numeric values"),
    Op::std(M::Array, "array/min", &["items", "key"], 1, up_to(2), "Smallest numeric value"),
    Op::std(M::Array, "array/max", &["items", "key"], 1, up_to(2), "Largest numeric value"),
    Op::std(M::Array, "array/count", &["items"], 1, up_to(1), "Number of elements"),
    Op::std(M::Array, "array/map", &["items", "fn"], 2, up_to(2), "Transforms each element")
        .with_lambda(1)
        .with_example(r#"["array/map", [1, 2, 3], ["fn", "x", ["*", "@x", 2]]]"#),
    Op::std(M::Array, "array/filter", &["items", "fn"], 2, up_to(2), "Keeps elements matching the predicate")
        .with_lambda(1)
        .with_example(r#"["array/filter", [1, 2, 3, 4, 5, 6], ["fn", "x", [">", "@x", 3]]]"#),
    Op::std(M::Array, "array/reject", &["items", "fn"], 2, up_to(2), "Drops elements matching the predicate")
        .with_lambda(1),
    Op::std(M::Array, "array/reduce", &["items", "fn", "initial"], 3, up_to(3), "Left fold from an explicit seed")
        .with_lambda(1)
        .with_example(r#"["array/reduce", [1, 2, 3], ["fn", ["acc", "x"], ["+", "@acc", "@x"]], 0]"#),
    Op::std(M::Array, "array/find", &["items", "fn"], 2, up_to(2), "First matching element")
        .with_lambda(1),
    Op::std(M::Array, "array/findIndex", &["items", "fn"], 2, up_to(2), "Index of the first match, or -1")
        .with_lambda(1),
    Op::std(M::Array, "array/every", &["items", "fn"], 2, up_to(2), "True if every element matches")
        .with_lambda(1),
    Op::std(M::Array, "array/some", &["items", "fn"], 2, up_to(2), "True if any element matches")
        .with_lambda(1),
    Op::std(M::Array, "array/partition", &["items", "fn"], 2, up_to(2), "Splits into [matching, rest]")
        .with_lambda(1),
    Op::std(M::Array, "array/sortBy", &["items", "fn", "order"], 2, up_to(3), "New list sorted by a computed key")
        .with_lambda(1),
];

// ============================================================================
// object library
// ============================================================================

pub(crate) const OBJECT: &[Op] = &[
    Op::std(M::Object, "object/get", &["object", "path", "default"], 2, up_to(3), "Reads a dotted path")
        .with_example(r#"["object/get", "@entity", "address.city"]"#),
    Op::std(M::Object, "object/set", &["object", "path", "value"], 3, up_to(3), "New object with a dotted path set"),
    Op::std(M::Object, "object/has", &["object", "path"], 2, up_to(2), "True if the dotted path exists"),
    Op::std(M::Object, "object/keys", &["object"], 1, up_to(1), "Keys"),
    Op::std(M::Object, "object/values", &["object"], 1, up_to(1), "Values"),
    Op::std(M::Object, "object/entries", &["object"], 1, up_to(1), "[key, value] pairs"),
    Op::std(M::Object, "object/fromEntries", &["entries"], 1, up_to(1), "Object from [key, value] pairs"),
    Op::std(M::Object, "object/merge", &["...objects"], 2, UNBOUNDED, "Merges objects; nested objects merge recursively"),
    Op::std(M::Object, "object/pick", &["object", "keys"], 2, up_to(2), "Keeps only the listed keys"),
    Op::std(M::Object, "object/omit", &["object", "keys"], 2, up_to(2), "Drops the listed keys"),
    Op::std(M::Object, "object/isEmpty", &["object"], 1, up_to(1), "True for null or an object without keys"),
];

// ============================================================================
// time library
// ============================================================================

pub(crate) const TIME: &[Op] = &[
    Op::std(M::Time, "time/now", &[], 0, up_to(0), "Current time in epoch milliseconds"),
    Op::std(M::Time, "time/today", &[], 0, up_to(0), "Start of the current UTC day"),
    Op::std(M::Time, "time/parse", &["value"], 1, up_to(1), "Parses an ISO-8601 string"),
    Op::std(M::Time, "time/format", &["time", "pattern"], 2, up_to(2), "Formats with YYYY, MM, DD, HH, mm, ss tokens"),
    Op::std(M::Time, "time/add", &["time", "amount", "unit"], 3, up_to(3), "Adds a duration"),
    Op::std(M::Time, "time/subtract", &["time", "amount", "unit"], 3, up_to(3), "Subtracts a duration"),
    Op::std(M::Time, "time/diff", &["a", "b", "unit"], 2, up_to(3), "a - b in the given unit"),
    Op::std(M::Time, "time/isBefore", &["a", "b"], 2, up_to(2), "a < b"),
    Op::std(M::Time, "time/isAfter", &["a", "b"], 2, up_to(2), "a > b"),
    Op::std(M::Time, "time/isPast", &["time"], 1, up_to(1), "Before now"),
    Op::std(M::Time, "time/isFuture", &["time"], 1, up_to(1), "After now"),
    Op::std(M::Time, "time/relative", &["time"], 1, up_to(1), "Human relative time such as \"5m ago\"")
        .with_example(r#"["time/relative", "@entity.createdAt"]"#),
    Op::std(M::Time, "time/startOf", &["time", "unit"], 2, up_to(2), "Start of the minute, hour, day, month or year"),
];

// ============================================================================
// validate library
// ============================================================================

pub(crate) const VALIDATE: &[Op] = &[
    Op::std(M::Validate, "validate/required", &["value"], 1, up_to(1), "Not null, not empty"),
    Op::std(M::Validate, "validate/string", &["value"], 1, up_to(1), "Is a string"),
    Op::std(M::Validate, "validate/number", &["value"], 1, up_to(1), "Is a number"),
    Op::std(M::Validate, "validate/boolean", &["value"], 1, up_to(1), "Is a boolean"),
    Op::std(M::Validate, "validate/array", &["value"], 1, up_to(1), "Is a list"),
    Op::std(M::Validate, "validate/object", &["value"], 1, up_to(1), "Is an object"),
    Op::std(M::Validate, "validate/integer", &["value"], 1, up_to(1), "Is an integral number"),
    Op::std(M::Validate, "validate/positive", &["value"], 1, up_to(1), "Is a number greater than zero"),
    Op::std(M::Validate, "validate/email", &["value"], 1, up_to(1), "Looks like an email address"),
    Op::std(M::Validate, "validate/url", &["value"], 1, up_to(1), "Is an http(s) URL"),
    Op::std(M::Validate, "validate/phone", &["value"], 1, up_to(1), "Looks like a phone number"),
    Op::std(M::Validate, "validate/date", &["value"], 1, up_to(1), "Parses as a date"),
    Op::std(M::Validate, "validate/minLength", &["value", "min"], 2, up_to(2), "Length at least min"),
    Op::std(M::Validate, "validate/maxLength", &["value", "max"], 2, up_to(2), "Length at most max"),
    Op::std(M::Validate, "validate/min", &["value", "min"], 2, up_to(2), "Number at least min"),
    Op::std(M::Validate, "validate/max", &["value", "max"], 2, up_to(2), "Number at most max"),
    Op::std(M::Validate, "validate/range", &["value", "min", "max"], 3, up_to(3), "Number within [min, max]"),
    Op::std(M::Validate, "validate/pattern", &["value", "regex"], 2, up_to(2), "Matches a regular expression"),
    Op::std(M::Validate, "validate/oneOf", &["value", "options"], 2, up_to(2), "Equals one of the options"),
    Op::std(M::Validate, "validate/equals", &["a", "b"], 2, up_to(2), "Deep structural equality"),
    Op::std(M::Validate, "validate/creditCard", &["value"], 1, up_to(1), "Passes the Luhn checksum"),
    Op::std(M::Validate, "validate/check", &["value", "rules"], 2, up_to(2), "Runs every rule per field and collects failures")
        .with_quoted(1)
        .with_example(r#"["validate/check", "@payload", {"email": ["required", "email"], "name": [["minLength", 2]]}]"#),
];

// ============================================================================
// format library
// ============================================================================

pub(crate) const FORMAT: &[Op] = &[
    Op::std(M::Format, "format/number", &["value", "decimals", "locale"], 1, up_to(3), "Grouped number"),
    Op::std(M::Format, "format/currency", &["value", "currency", "locale"], 1, up_to(3), "Money amount")
        .with_example(r#"["format/currency", 1234.5, "EUR", "de-DE"]"#),
    Op::std(M::Format, "format/percent", &["value", "decimals"], 1, up_to(2), "Fraction as a percentage"),
    Op::std(M::Format, "format/bytes", &["bytes", "decimals"], 1, up_to(2), "Human readable byte size"),
    Op::std(M::Format, "format/ordinal", &["n"], 1, up_to(1), "1st, 2nd, 3rd, ..."),
    Op::std(M::Format, "format/plural", &["count", "singular", "plural"], 2, up_to(3), "Count with the matching noun form"),
    Op::std(M::Format, "format/compact", &["value", "locale"], 1, up_to(2), "Short form such as 1.2K"),
    Op::std(M::Format, "format/list", &["items", "conjunction"], 1, up_to(2), "Natural language list"),
];

// ============================================================================
// async library
// ============================================================================

pub(crate) const ASYNC: &[Op] = &[
    Op::std(M::Async, "async/delay", &["ms", "effect"], 1, up_to(2), "Runs after a delay").effectful(),
    Op::std(M::Async, "async/timeout", &["effect", "ms"], 2, up_to(2), "Fails the effect after ms").effectful(),
    Op::std(M::Async, "async/debounce", &["ms", "effect", "key"], 2, up_to(3), "Runs after ms of quiet").effectful(),
    Op::std(M::Async, "async/throttle", &["ms", "effect", "key"], 2, up_to(3), "Runs at most once per ms").effectful(),
    Op::std(M::Async, "async/retry", &["effect", "attempts", "options"], 2, up_to(3), "Retries with backoff").effectful(),
    Op::std(M::Async, "async/race", &["...effects"], 1, UNBOUNDED, "First effect to finish wins").effectful(),
    Op::std(M::Async, "async/all", &["...effects"], 1, UNBOUNDED, "Runs effects concurrently").effectful(),
];

// ============================================================================
// tensor library
// ============================================================================

pub(crate) const TENSOR: &[Op] = &[
    // Creation
    Op::std(M::Tensor, "tensor/from", &["data"], 1, up_to(1), "Tensor from nested lists"),
    Op::std(M::Tensor, "tensor/zeros", &["shape"], 1, up_to(1), "Tensor of zeros"),
    Op::std(M::Tensor, "tensor/ones", &["shape"], 1, up_to(1), "Tensor of ones"),
    Op::std(M::Tensor, "tensor/rand", &["shape"], 1, up_to(1), "Uniform random values in [0, 1)"),
    Op::std(M::Tensor, "tensor/randn", &["shape"], 1, up_to(1), "Standard normal random values"),
    // Shape and indexing
    Op::std(M::Tensor, "tensor/shape", &["tensor"], 1, up_to(1), "Dimensions"),
    Op::std(M::Tensor, "tensor/get", &["tensor", "index"], 2, up_to(2), "Element or row at index"),
    Op::std(M::Tensor, "tensor/slice", &["tensor", "start", "end"], 3, up_to(3), "Rows start..end"),
    Op::std(M::Tensor, "tensor/reshape", &["tensor", "shape"], 2, up_to(2), "Same data, new shape"),
    Op::std(M::Tensor, "tensor/flatten", &["tensor"], 1, up_to(1), "1-D view"),
    // Arithmetic
    Op::std(M::Tensor, "tensor/add", &["a", "b"], 2, up_to(2), "Elementwise addition"),
    Op::std(M::Tensor, "tensor/sub", &["a", "b"], 2, up_to(2), "Elementwise subtraction"),
    Op::std(M::Tensor, "tensor/mul", &["a", "b"], 2, up_to(2), "Elementwise multiplication"),
    Op::std(M::Tensor, "tensor/div", &["a", "b"], 2, up_to(2), "Elementwise division"),
    Op::std(M::Tensor, "tensor/matmul", &["a", "b"], 2, up_to(2), "Matrix product"),
    Op::std(M::Tensor, "tensor/dot", &["a", "b"], 2, up_to(2), "Dot product of flattened tensors"),
    // Reductions
    Op::std(M::Tensor, "tensor/sum", &["tensor", "axis"], 1, up_to(2), "Sum, optionally along an axis"),
    Op::std(M::Tensor, "tensor/mean", &["tensor", "axis"], 1, up_to(2), "Mean, optionally along an axis"),
    Op::std(M::Tensor, "tensor/max", &["tensor", "axis"], 1, up_to(2), "Maximum, optionally along an axis"),
    Op::std(M::Tensor, "tensor/min", &["tensor", "axis"], 1, up_to(2), "Minimum, optionally along an axis"),
    Op::std(M::Tensor, "tensor/argmax", &["tensor"], 1, up_to(1), "Flat index of the maximum"),
    Op::std(M::Tensor, "tensor/norm", &["tensor"], 1, up_to(1), "L2 norm"),
    // Range contracts
    Op::std(M::Tensor, "tensor/allInRange", &["tensor", "range"], 2, up_to(2), "Every element within [min, max]"),
    Op::std(M::Tensor, "tensor/clamp", &["tensor", "min", "max"], 3, up_to(3), "Clamps every element"),
    Op::std(M::Tensor, "tensor/clampPerDim", &["tensor", "ranges"], 2, up_to(2), "Clamps each dimension to its own range")
        .with_example(r#"["tensor/clampPerDim", "@payload.output", {"0": {"min": 0, "max": 1}}]"#),
    Op::std(M::Tensor, "tensor/outOfRangeDims", &["tensor", "ranges"], 2, up_to(2), "Dimensions outside their range"),
    Op::std(M::Tensor, "tensor/checkInput", &["tensor", "contract"], 2, up_to(2), "Shape and range violation, or null"),
    // Conversion
    Op::std(M::Tensor, "tensor/toList", &["tensor"], 1, up_to(1), "Nested lists"),
];

// ============================================================================
// nn library
// ============================================================================

pub(crate) const NN: &[Op] = &[
    Op::std(M::Nn, "nn/linear", &["inFeatures", "outFeatures", "weight", "bias"], 2, up_to(4), "Fully connected layer"),
    Op::std(M::Nn, "nn/relu", &[], 0, up_to(0), "ReLU activation"),
    Op::std(M::Nn, "nn/tanh", &[], 0, up_to(0), "Tanh activation"),
    Op::std(M::Nn, "nn/sigmoid", &[], 0, up_to(0), "Sigmoid activation"),
    Op::std(M::Nn, "nn/softmax", &["dim"], 0, up_to(1), "Softmax activation"),
    Op::std(M::Nn, "nn/dropout", &["p"], 0, up_to(1), "Dropout, identity at inference"),
    Op::std(M::Nn, "nn/batchnorm", &["features"], 1, up_to(1), "Batch normalization"),
    Op::std(M::Nn, "nn/layernorm", &["features"], 1, up_to(1), "Layer normalization"),
    Op::std(M::Nn, "nn/sequential", &["...layers"], 1, UNBOUNDED, "Layers applied in order")
        .with_example(r#"["nn/sequential", ["nn/linear", 4, 8], ["nn/relu"], ["nn/linear", 8, 2]]"#),
    Op::std(M::Nn, "nn/forward", &["network", "input"], 2, up_to(2), "Inference on the host backend"),
];

// ============================================================================
// train library
// ============================================================================

pub(crate) const TRAIN: &[Op] = &[
    Op::std(M::Train, "train/mse", &["prediction", "target"], 2, up_to(2), "Mean squared error"),
    Op::std(M::Train, "train/forbiddenRegions", &["output", "regions"], 2, up_to(2), "Output dimensions inside forbidden regions"),
    Op::std(M::Train, "train/constraintLoss", &["output", "regions", "penalty"], 2, up_to(3), "Penalty for forbidden-region outputs"),
    Op::std(M::Train, "train/loop", &["network", "data", "config"], 3, up_to(3), "Trains host-held weights").effectful(),
    Op::std(M::Train, "train/step", &["network", "sample", "config"], 3, up_to(3), "Single optimizer step").effectful(),
];

/// Every standard module with its table.
pub(crate) const MODULES: &[(M, &[Op])] = &[
    (M::Math, MATH),
    (M::Str, STR),
    (M::Array, ARRAY),
    (M::Object, OBJECT),
    (M::Time, TIME),
    (M::Validate, VALIDATE),
    (M::Format, FORMAT),
    (M::Async, ASYNC),
    (M::Tensor, TENSOR),
    (M::Nn, NN),
    (M::Train, TRAIN),
];

/// Iterates over every catalogued operator.
pub(crate) fn operators() -> impl Iterator<Item = &'static Op> {
    CORE.iter()
        .chain(MODULES.iter().flat_map(|(_, ops)| ops.iter()))
}
