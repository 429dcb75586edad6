/*
 * Created on Thu Feb 15 2024
 *
 * This file is a part of libfast
 * libfast is a library of reusable, high-performance data structures
 * and storage primitives written by Sayan Nandan ("the Author") to
 * serve as the common foundation for building fast systems software
 *
 * Copyright (c) 2024, Sayan Nandan <nandansayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! File plumbing for the marshal framework: exclusive temp files mapped for
//! writing with an atomic-rename publish step, and shared read-only maps
//! for the unmarshal paths.

use {
    crate::error::{Error, RuntimeResult},
    log::debug,
    memmap2::{Mmap, MmapMut},
    std::{
        fs,
        io::ErrorKind,
        path::{Path, PathBuf},
        sync::Arc,
    },
};

/// An exclusively created `<dst>.tmp.<nonce>` file in the destination's
/// directory, extended to `size` and mapped read-write. Nothing is visible
/// at `dst` until [`AtomicMappedFile::publish`] renames over it; dropping
/// without publishing removes the temp file
pub(crate) struct AtomicMappedFile {
    tmp: PathBuf,
    dst: PathBuf,
    file: fs::File,
    map: MmapMut,
    published: bool,
}

impl AtomicMappedFile {
    pub fn create(dst: &Path, size: u64) -> RuntimeResult<Self> {
        if size == 0 {
            return Err(Error::InvalidArgument);
        }
        let (tmp, file) = loop {
            let mut name = dst.as_os_str().to_owned();
            name.push(format!(".tmp.{:08x}", rand::random::<u32>()));
            let tmp = PathBuf::from(name);
            match fs::OpenOptions::new()
                .read(true)
                .write(true)
                .create_new(true)
                .open(&tmp)
            {
                Ok(f) => break (tmp, f),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        };
        let prepared: RuntimeResult<MmapMut> = (|| {
            file.set_len(size)?;
            let map = unsafe {
                // UNSAFE(@ohsayan): we hold the only handle to a file nobody
                // else can see yet
                MmapMut::map_mut(&file)?
            };
            Ok(map)
        })();
        match prepared {
            Ok(map) => Ok(Self {
                tmp,
                dst: dst.to_owned(),
                file,
                map,
                published: false,
            }),
            Err(e) => {
                let _ = fs::remove_file(&tmp);
                Err(e)
            }
        }
    }
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.map
    }
    /// Flush, sync and atomically rename over the destination
    pub fn publish(mut self) -> RuntimeResult<()> {
        self.map.flush()?;
        self.file.sync_all()?;
        fs::rename(&self.tmp, &self.dst)?;
        self.published = true;
        debug!("published {}", self.dst.display());
        Ok(())
    }
}

impl Drop for AtomicMappedFile {
    fn drop(&mut self) {
        if !self.published {
            let _ = fs::remove_file(&self.tmp);
        }
    }
}

/// Map `path` read-only. The map is shared so that zero-copy consumers can
/// hold onto it past the unmarshal call
pub(crate) fn open_mapped(path: &Path) -> RuntimeResult<Arc<Mmap>> {
    let file = fs::File::open(path)?;
    let map = unsafe {
        // UNSAFE(@ohsayan): read-only mapping; concurrent truncation of a
        // published file is outside our contract
        Mmap::map(&file)?
    };
    debug!("mapped {} ({}B)", path.display(), map.len());
    Ok(Arc::new(map))
}
