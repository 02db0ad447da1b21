// SPDX-License-Identifier: GPL-3.0-only

//! Frame utilities: orientation math, rotate-and-scale, RGBA to NV21

pub mod conversions;
