/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;

/// HTTP-style status code reported by a store for a single response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Status(u16);

impl Status {
    /// 200: the item was read.
    pub const OK: Status = Status(200);
    /// 201: the item was created.
    pub const CREATED: Status = Status(201);
    /// 400: the store rejected the request.
    pub const BAD_REQUEST: Status = Status(400);
    /// 404: the item or container does not exist.
    pub const NOT_FOUND: Status = Status(404);
    /// 409: an item with the same identity already exists.
    pub const CONFLICT: Status = Status(409);
    /// 429: the request was throttled.
    pub const TOO_MANY_REQUESTS: Status = Status(429);
    /// 503: the store is temporarily unavailable.
    pub const SERVICE_UNAVAILABLE: Status = Status(503);

    /// Creates a status from a raw code.
    pub const fn from_u16(code: u16) -> Self {
        Status(code)
    }

    /// True for any 2xx status.
    pub fn is_success(self) -> bool {
        (200..300).contains(&self.0)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
