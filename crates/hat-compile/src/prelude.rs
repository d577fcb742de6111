//! Fixed helper block emitted at the top of every artifact
//!
//! Trigger evaluation uses the lenient `_get`/`_num` accessors: a missing
//! input means "did not fire". Condition and action evaluation use the
//! strict `_req` family, which raises `InputError` so the section reports
//! an explicit error instead of a silent False.

pub const PRELUDE: &str = r#"import json
import sys


class InputError(Exception):
    pass


def _get(inputs, slot):
    return inputs[slot] if 0 <= slot < len(inputs) else None


def _num(value):
    if isinstance(value, bool):
        return None
    try:
        return float(value)
    except (TypeError, ValueError):
        return None


def _truthy(value):
    if isinstance(value, bool):
        return value
    return value in ("true", "True", "on", "yes", 1)


def _in_range(value, above, below):
    if value is None:
        return False
    if above is not None and not (above < value):
        return False
    if below is not None and not (value < below):
        return False
    return True


def _pattern_ok(value, hours, minutes, seconds):
    try:
        h, m, s = [int(part) for part in value.split(":")]
    except (AttributeError, ValueError):
        return False
    for part, pattern in ((h, hours), (m, minutes), (s, seconds)):
        if pattern is None or pattern == "*":
            continue
        if pattern.startswith("/"):
            if part % int(pattern[1:]) != 0:
                return False
        elif part != int(pattern):
            return False
    return True


def _req(inputs, slot):
    value = _get(inputs, slot)
    if value is None:
        raise InputError("missing input at slot %d" % slot)
    return value


def _num_req(inputs, slot):
    value = _num(_req(inputs, slot))
    if value is None:
        raise InputError("non-numeric input at slot %d" % slot)
    return value


def _bool_req(inputs, slot):
    value = _req(inputs, slot)
    if isinstance(value, bool):
        return value
    if value in ("true", "True", "on", "yes", 1):
        return True
    if value in ("false", "False", "off", "no", 0):
        return False
    raise InputError("non-boolean input at slot %d" % slot)


def _range_ok(value, above, below):
    if above is not None and not (above < value):
        return False
    if below is not None and not (value < below):
        return False
    return True


def _time_ok(value, after, before, weekdays):
    parts = str(value).split(" ")
    clock = parts[-1]
    if weekdays:
        if len(parts) < 2 or parts[0] not in weekdays:
            return False
    if after is not None and not (after <= clock):
        return False
    if before is not None and not (clock < before):
        return False
    return True


def _fired(inputs, slot, trigger_id, expected):
    value = _get(inputs, slot)
    if value is None:
        value = trigger_id
    if value is None:
        raise InputError("missing input at slot %d" % slot)
    return value == expected
"#;
