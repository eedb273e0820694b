//! Python bindings

use crate::*;
use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyLong, PyModule};

impl From<Error> for PyErr {
    fn from(e: Error) -> Self {
        pyo3::exceptions::PyValueError::new_err(e.to_string())
    }
}

/// Python wrapper for a random linear hash over GF(2)
#[pyclass(name = "LinearHash")]
pub struct PyLinearHash {
    inner: LinearHash,
}

#[pymethods]
impl PyLinearHash {
    /// Create a random l x u matrix from the given seed.
    /// Both l and u must be positive.
    #[new]
    fn new(l: usize, u: usize, seed: u64) -> PyResult<Self> {
        Ok(PyLinearHash {
            inner: LinearHash::new(l, u, seed)?,
        })
    }

    /// Compute h(x) given x as little-endian uint64 blocks
    fn hash(&self, x: Vec<u64>) -> PyResult<Vec<u64>> {
        Ok(self.inner.hash(&x)?.into_words())
    }

    /// Compute h(x) for every x, each given as little-endian uint64 blocks
    fn hash_many(&self, py: Python<'_>, xs: Vec<Vec<u64>>) -> PyResult<Vec<Vec<u64>>> {
        let ys = py.allow_threads(|| self.inner.hash_batch(&xs))?;
        Ok(ys.into_iter().map(BitVec::into_words).collect())
    }

    /// Compute h(x) given x as a Python int, return Python int.
    /// Bit i of x is input bit i; x must be in [0, 2^u).
    fn hash_int(&self, py: Python<'_>, x: &Bound<'_, PyLong>) -> PyResult<PyObject> {
        let x = int_to_bitvec(x, self.inner.u())?;
        let y = self.inner.hash(x.words())?;
        bitvec_to_int(py, &y)
    }

    /// Compute h(x) for every Python int x
    fn hash_many_int(&self, py: Python<'_>, xs: Vec<Bound<'_, PyLong>>) -> PyResult<Vec<PyObject>> {
        let xs = xs
            .iter()
            .map(|x| int_to_bitvec(x, self.inner.u()))
            .collect::<PyResult<Vec<_>>>()?;
        let ys = py.allow_threads(|| self.inner.hash_batch(&xs))?;
        ys.iter().map(|y| bitvec_to_int(py, y)).collect()
    }

    #[getter]
    fn l(&self) -> usize {
        self.inner.l()
    }

    #[getter]
    fn u(&self) -> usize {
        self.inner.u()
    }

    #[getter]
    fn seed(&self) -> u64 {
        self.inner.seed()
    }

    fn __repr__(&self) -> String {
        format!(
            "LinearHash(l={}, u={}, seed={})",
            self.inner.l(),
            self.inner.u(),
            self.inner.seed()
        )
    }
}

// Negative ints and ints wider than the input words raise OverflowError from to_bytes
fn int_to_bitvec(x: &Bound<'_, PyLong>, width: usize) -> PyResult<BitVec> {
    let nbytes = words_for(width) * 8;
    let bytes = x.call_method1("to_bytes", (nbytes, "little"))?;
    Ok(BitVec::from_le_bytes(bytes.downcast::<PyBytes>()?.as_bytes(), width)?)
}

fn bitvec_to_int(py: Python<'_>, y: &BitVec) -> PyResult<PyObject> {
    let bytes = PyBytes::new_bound(py, &y.to_le_bytes());
    let int = py
        .get_type_bound::<PyLong>()
        .call_method1("from_bytes", (bytes, "little"))?;
    Ok(int.unbind())
}

/// Run one max-load trial per (seed_S, seed_h) pair and return the max loads in order
#[pyfunction]
#[pyo3(name = "run_trials", signature = (u, l, m, dist, seeds_S, seeds_h, k = DEFAULT_CAPACITY, num_threads = 0))]
#[allow(non_snake_case, clippy::too_many_arguments)]
fn py_run_trials(
    py: Python<'_>,
    u: usize,
    l: usize,
    m: u64,
    dist: &str,
    seeds_S: Vec<u64>,
    seeds_h: Vec<u64>,
    k: usize,
    num_threads: usize,
) -> PyResult<Vec<u32>> {
    let dist = dist.to_owned();
    let loads = py.allow_threads(|| {
        run_trials(u, l, m, &dist, &seeds_S, &seeds_h, k, num_threads)
    })?;
    Ok(loads)
}

/// ceil(r * ln n / ln ln n) with n = 2^l
#[pyfunction]
#[pyo3(name = "threshold")]
fn py_threshold(l: usize, r: f64) -> PyResult<u32> {
    Ok(threshold(l, r)?)
}

/// Python module definition
#[pymodule]
fn maxload(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyLinearHash>()?;
    m.add_function(wrap_pyfunction!(py_run_trials, m)?)?;
    m.add_function(wrap_pyfunction!(py_threshold, m)?)?;
    m.add("DEFAULT_CAPACITY", DEFAULT_CAPACITY)?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}
