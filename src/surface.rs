use log::trace;

use crate::error::TracerError;

/// Execution context currently allowed to touch the output image
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SurfaceOwner {
    Display,
    Compute,
}

/// Output image shared between the compute dispatch and a display path.
/// Compute writes require a `SurfaceGuard`; display reads are refused while one is out.
#[derive(Debug)]
pub struct SharedSurface<T> {
    target: T,
    width: u32,
    height: u32,
    owner: SurfaceOwner,
}

/// Exclusive compute access to a `SharedSurface`; hands it back to display on drop
#[must_use]
#[derive(Debug)]
pub struct SurfaceGuard<'a, T> {
    surface: &'a mut SharedSurface<T>,
}

impl<T> SharedSurface<T> {
    /// Wrap a device target; the display side owns it initially
    pub fn new(target: T, width: u32, height: u32) -> Self {
        Self {
            target,
            width,
            height,
            owner: SurfaceOwner::Display,
        }
    }

    /// Take the image for compute. Fails when a previous guard was never released.
    pub fn acquire(&mut self) -> Result<SurfaceGuard<'_, T>, TracerError> {
        if self.owner == SurfaceOwner::Compute {
            return Err(TracerError::SurfaceBusy);
        }
        self.owner = SurfaceOwner::Compute;
        trace!("Surface acquired for compute");
        Ok(SurfaceGuard { surface: self })
    }

    /// The image for sampling or readback
    pub fn display(&self) -> Result<&T, TracerError> {
        match self.owner {
            SurfaceOwner::Display => Ok(&self.target),
            SurfaceOwner::Compute => Err(TracerError::SurfaceAcquired),
        }
    }

    pub fn owner(&self) -> SurfaceOwner {
        self.owner
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl<'a, T> SurfaceGuard<'a, T> {
    pub fn target(&self) -> &T {
        &self.surface.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.surface.target
    }

    pub fn size(&self) -> (u32, u32) {
        (self.surface.width, self.surface.height)
    }

    /// Hand the image back to display
    pub fn release(self) {}
}

impl<'a, T> Drop for SurfaceGuard<'a, T> {
    fn drop(&mut self) {
        self.surface.owner = SurfaceOwner::Display;
        trace!("Surface released to display");
    }
}
