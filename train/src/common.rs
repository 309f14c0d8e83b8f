//! Common imports from external crates.

pub use anyhow::{bail, ensure, format_err, Context, Error, Result};
pub use approx::{abs_diff_eq, AbsDiffEq};
pub use bbox::{prelude::*, Affine, Projective, Transform, HW, TLBR};
pub use chrono::{DateTime, Local};
pub use derivative::Derivative;
pub use image::{
    imageops::{self, FilterType},
    Rgb, RgbImage,
};
pub use itertools::{izip, Itertools};
pub use noisy_float::prelude::*;
pub use rand::{prelude::*, rngs::StdRng};
pub use rand_distr::StandardNormal;
pub use serde::{
    de::Error as DeserializeError, Deserialize, Deserializer, Serialize, Serializer,
};
pub use std::{
    borrow::Borrow,
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt::{self, Debug, Display},
    fs, iter, mem,
    num::NonZeroUsize,
    ops::Deref,
    path::{Path, PathBuf},
    sync::{
        atomic::{self, AtomicBool, AtomicUsize},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};
pub use tracing::{debug, error, info, info_span, trace, warn};

pub type Fallible<T> = Result<T, Error>;

/// A class-labeled box in pixel units of the image it belongs to.
pub type LabeledBox = label::Label<TLBR<f64>, String>;
