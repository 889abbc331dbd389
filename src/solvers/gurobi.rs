//! A solver that uses [Gurobi](https://www.gurobi.com) through its C library,
//! including its general nonlinear constraints (Gurobi 12 and later).
//!
//! Requires the `gurobi` feature, a local Gurobi installation and a license.
//! `build.rs` looks for the library in `$GUROBI_HOME/lib`.
//!
//! ```no_run
//! use genconstr_nl::solvers::gurobi::GurobiEnv;
//! use genconstr_nl::{nl_eq, sin, variable, Environment, SolverModel};
//!
//! let env = GurobiEnv::builder().log_file("model.log").output_flag(false).start()?;
//! let mut model = env.new_model("sine")?;
//! let y = model.add_variable(variable().obj(1).name("y"))?;
//! let x = model.add_variable(variable().clamp(-1, 1).name("x"))?;
//! model.add_nl_constraint(nl_eq(y, sin(x))?)?;
//! model.optimize()?;
//! println!("y = {}", model.value(y)?);
//! # Ok::<_, genconstr_nl::SolverError>(())
//! ```
#![allow(unsafe_code)]

use std::cell::Cell;
use std::ffi::{CStr, CString};
use std::marker::PhantomData;
use std::ptr;

use libc::{c_char, c_int};
use tracing::{debug, trace, warn};

use crate::constraint::{ConstraintReference, NlConstraint};
use crate::solvers::{
    check_nl_constraint, AttrName, DoubleAttr, Environment, IntAttr, SolverError, SolverModel,
    StringAttr,
};
use crate::variable::{Variable, VariableDefinition};

/// Gurobi's representation of an infinite bound
pub const GRB_INFINITY: f64 = 1e100;

mod ffi {
    use libc::{c_char, c_double, c_int};

    #[repr(C)]
    pub struct GRBenv {
        _private: [u8; 0],
    }

    #[repr(C)]
    pub struct GRBmodel {
        _private: [u8; 0],
    }

    // See gurobi_c.h. The library itself is linked by build.rs.
    extern "C" {
        pub fn GRBemptyenv(envP: *mut *mut GRBenv) -> c_int;
        pub fn GRBstartenv(env: *mut GRBenv) -> c_int;
        pub fn GRBfreeenv(env: *mut GRBenv);
        pub fn GRBgeterrormsg(env: *mut GRBenv) -> *const c_char;
        pub fn GRBgetenv(model: *mut GRBmodel) -> *mut GRBenv;
        pub fn GRBversion(majorP: *mut c_int, minorP: *mut c_int, technicalP: *mut c_int);

        pub fn GRBsetintparam(env: *mut GRBenv, paramname: *const c_char, value: c_int) -> c_int;
        pub fn GRBsetdblparam(env: *mut GRBenv, paramname: *const c_char, value: c_double)
            -> c_int;
        pub fn GRBsetstrparam(
            env: *mut GRBenv,
            paramname: *const c_char,
            value: *const c_char,
        ) -> c_int;

        pub fn GRBnewmodel(
            env: *mut GRBenv,
            modelP: *mut *mut GRBmodel,
            Pname: *const c_char,
            numvars: c_int,
            obj: *mut c_double,
            lb: *mut c_double,
            ub: *mut c_double,
            vtype: *mut c_char,
            varnames: *mut *mut c_char,
        ) -> c_int;
        pub fn GRBfreemodel(model: *mut GRBmodel) -> c_int;
        pub fn GRBupdatemodel(model: *mut GRBmodel) -> c_int;
        pub fn GRBoptimize(model: *mut GRBmodel) -> c_int;

        pub fn GRBaddvar(
            model: *mut GRBmodel,
            numnz: c_int,
            vind: *mut c_int,
            vval: *mut c_double,
            obj: c_double,
            lb: c_double,
            ub: c_double,
            vtype: c_char,
            varname: *const c_char,
        ) -> c_int;
        pub fn GRBaddgenconstrNL(
            model: *mut GRBmodel,
            name: *const c_char,
            resvar: c_int,
            nnodes: c_int,
            opcode: *mut c_int,
            data: *mut c_double,
            parent: *mut c_int,
        ) -> c_int;

        pub fn GRBgetintattr(
            model: *mut GRBmodel,
            attrname: *const c_char,
            valueP: *mut c_int,
        ) -> c_int;
        pub fn GRBgetdblattr(
            model: *mut GRBmodel,
            attrname: *const c_char,
            valueP: *mut c_double,
        ) -> c_int;
        pub fn GRBgetdblattrelement(
            model: *mut GRBmodel,
            attrname: *const c_char,
            element: c_int,
            valueP: *mut c_double,
        ) -> c_int;
        pub fn GRBgetstrattrelement(
            model: *mut GRBmodel,
            attrname: *const c_char,
            element: c_int,
            valueP: *mut *mut c_char,
        ) -> c_int;
    }
}

/// The version of the linked Gurobi library, as (major, minor, technical)
pub fn version() -> (i32, i32, i32) {
    let (mut major, mut minor, mut technical) = (0, 0, 0);
    unsafe { ffi::GRBversion(&mut major, &mut minor, &mut technical) };
    (major, minor, technical)
}

fn c_string(s: &str) -> Result<CString, SolverError> {
    CString::new(s).map_err(|_| {
        SolverError::new(
            SolverError::INVALID_ARGUMENT,
            format!("{:?} contains an interior NUL byte", s),
        )
    })
}

fn c_index(index: usize) -> Result<c_int, SolverError> {
    c_int::try_from(index).map_err(|_| {
        SolverError::new(
            SolverError::INDEX_OUT_OF_RANGE,
            format!("index {} does not fit the C interface", index),
        )
    })
}

fn clamp_bound(bound: f64) -> f64 {
    bound.max(-GRB_INFINITY).min(GRB_INFINITY)
}

/// # Safety
/// `env` must be null or a live environment
unsafe fn error_from(env: *mut ffi::GRBenv, code: c_int, operation: &'static str) -> SolverError {
    let message = if env.is_null() {
        String::new()
    } else {
        let raw = ffi::GRBgeterrormsg(env);
        if raw.is_null() {
            String::new()
        } else {
            CStr::from_ptr(raw).to_string_lossy().into_owned()
        }
    };
    let message = if message.is_empty() {
        format!("{} failed", operation)
    } else {
        message
    };
    warn!(
        component = "solver",
        operation,
        code,
        message = %message,
        "Gurobi call failed"
    );
    SolverError::new(code, message)
}

/// A Gurobi parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Integer parameter
    Int(i32),
    /// Floating point parameter
    Double(f64),
    /// String parameter
    String(String),
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}
impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Int(v as i32)
    }
}
impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}
impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}
impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::String(v.into())
    }
}

/// Collects parameters, then starts a [GurobiEnv] with them.
/// Parameters are applied in the order they were set.
#[derive(Debug, Clone, Default)]
pub struct GurobiEnvBuilder {
    params: Vec<(String, ParamValue)>,
}

impl GurobiEnvBuilder {
    /// Sets a Gurobi parameter. See https://docs.gurobi.com/projects/optimizer/en/current/reference/parameters.html
    pub fn set_param<K: Into<String>, V: Into<ParamValue>>(mut self, key: K, value: V) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// File the solver writes its log to
    pub fn log_file<S: Into<String>>(self, path: S) -> Self {
        self.set_param("LogFile", path.into())
    }

    /// Whether the solver prints its log to the console
    pub fn output_flag(self, enabled: bool) -> Self {
        self.set_param("OutputFlag", enabled)
    }

    /// Limit on the time spent optimizing, in seconds
    pub fn time_limit(self, seconds: f64) -> Self {
        self.set_param("TimeLimit", seconds)
    }

    /// Number of threads the solver may use
    pub fn threads(self, threads: u32) -> Self {
        self.set_param("Threads", threads.min(i32::MAX as u32) as i32)
    }

    /// The parameters set so far
    pub fn params(&self) -> &[(String, ParamValue)] {
        &self.params
    }

    /// Create the environment, apply the parameters and start it
    pub fn start(self) -> Result<GurobiEnv, SolverError> {
        let mut raw = ptr::null_mut();
        let code = unsafe { ffi::GRBemptyenv(&mut raw) };
        // From here on, dropping `env` frees the handle on every error path
        let env = GurobiEnv { raw };
        if code != 0 {
            return Err(unsafe { error_from(env.raw, code, "GRBemptyenv") });
        }
        for (name, value) in &self.params {
            env.apply(name, value)?;
        }
        env.check("GRBstartenv", unsafe { ffi::GRBstartenv(env.raw) })?;
        debug!(
            component = "solver",
            operation = "init_gurobi",
            status = "success",
            params = self.params.len(),
            "Started Gurobi environment"
        );
        Ok(env)
    }
}

/// A Gurobi environment. Freed when dropped, after all its models.
pub struct GurobiEnv {
    raw: *mut ffi::GRBenv,
}

impl GurobiEnv {
    /// Start an environment that logs to the given file
    pub fn new(log_file: &str) -> Result<Self, SolverError> {
        Self::builder().log_file(log_file).start()
    }

    /// Configure an environment before starting it
    pub fn builder() -> GurobiEnvBuilder {
        GurobiEnvBuilder::default()
    }

    fn check(&self, operation: &'static str, code: c_int) -> Result<(), SolverError> {
        if code == 0 {
            Ok(())
        } else {
            Err(unsafe { error_from(self.raw, code, operation) })
        }
    }

    fn apply(&self, name: &str, value: &ParamValue) -> Result<(), SolverError> {
        let c_name = c_string(name)?;
        let code = match value {
            ParamValue::Int(v) => unsafe { ffi::GRBsetintparam(self.raw, c_name.as_ptr(), *v) },
            ParamValue::Double(v) => unsafe { ffi::GRBsetdblparam(self.raw, c_name.as_ptr(), *v) },
            ParamValue::String(v) => {
                let c_value = c_string(v)?;
                unsafe { ffi::GRBsetstrparam(self.raw, c_name.as_ptr(), c_value.as_ptr()) }
            }
        };
        trace!(component = "solver", operation = "set_param", param = name, "Setting parameter");
        self.check("GRBsetparam", code)
    }
}

impl Drop for GurobiEnv {
    fn drop(&mut self) {
        if !self.raw.is_null() {
            unsafe { ffi::GRBfreeenv(self.raw) };
            debug!(component = "solver", operation = "free_env", "Released Gurobi environment");
        }
    }
}

impl Environment for GurobiEnv {
    type Model<'env> = GurobiModel<'env>;

    fn new_model(&self, name: &str) -> Result<GurobiModel<'_>, SolverError> {
        let c_name = c_string(name)?;
        let mut raw = ptr::null_mut();
        let code = unsafe {
            ffi::GRBnewmodel(
                self.raw,
                &mut raw,
                c_name.as_ptr(),
                0,
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
            )
        };
        let model = GurobiModel {
            raw,
            num_vars: 0,
            num_gen_constrs: 0,
            pending: Cell::new(false),
            _env: PhantomData,
        };
        self.check("GRBnewmodel", code)?;
        debug!(
            component = "solver",
            operation = "new_model",
            status = "success",
            model = name,
            "Created Gurobi model"
        );
        Ok(model)
    }
}

/// A Gurobi model. It borrows its environment, and is freed when dropped.
pub struct GurobiModel<'env> {
    raw: *mut ffi::GRBmodel,
    num_vars: usize,
    num_gen_constrs: usize,
    // modifications not yet processed by GRBupdatemodel
    pending: Cell<bool>,
    _env: PhantomData<&'env GurobiEnv>,
}

impl GurobiModel<'_> {
    fn check(&self, operation: &'static str, code: c_int) -> Result<(), SolverError> {
        if code == 0 {
            Ok(())
        } else {
            Err(unsafe { error_from(ffi::GRBgetenv(self.raw), code, operation) })
        }
    }

    /// Queries only see variables and constraints once the model is updated
    fn flush(&self) -> Result<(), SolverError> {
        if self.pending.get() {
            self.check("GRBupdatemodel", unsafe { ffi::GRBupdatemodel(self.raw) })?;
            self.pending.set(false);
        }
        Ok(())
    }

    /// Number of variables added so far
    pub fn num_vars(&self) -> usize {
        self.num_vars
    }
}

impl Drop for GurobiModel<'_> {
    fn drop(&mut self) {
        if !self.raw.is_null() {
            unsafe { ffi::GRBfreemodel(self.raw) };
            debug!(component = "solver", operation = "free_model", "Released Gurobi model");
        }
    }
}

impl SolverModel for GurobiModel<'_> {
    fn add_variable(&mut self, definition: VariableDefinition) -> Result<Variable, SolverError> {
        let c_name = c_string(definition.get_name())?;
        let code = unsafe {
            ffi::GRBaddvar(
                self.raw,
                0,
                ptr::null_mut(),
                ptr::null_mut(),
                definition.obj,
                clamp_bound(definition.min),
                clamp_bound(definition.max),
                definition.var_type.as_char() as c_char,
                c_name.as_ptr(),
            )
        };
        self.check("GRBaddvar", code)?;
        let var = Variable::at(self.num_vars);
        self.num_vars += 1;
        self.pending.set(true);
        trace!(
            lower_bound = definition.min,
            upper_bound = definition.max,
            objective_coefficient = definition.obj,
            index = var.index(),
            component = "solver",
            operation = "add_variable",
            status = "success",
            "Adding variable"
        );
        Ok(var)
    }

    fn add_nl_constraint(
        &mut self,
        constraint: NlConstraint,
    ) -> Result<ConstraintReference, SolverError> {
        check_nl_constraint(&constraint, self.num_vars)?;
        let c_name = constraint.name.as_deref().map(c_string).transpose()?;
        let tree = &constraint.tree;
        let mut opcode = tree.opcode_codes();
        let mut data = tree.data().to_vec();
        let mut parent = tree.parents().to_vec();
        let code = unsafe {
            ffi::GRBaddgenconstrNL(
                self.raw,
                c_name.as_ref().map_or(ptr::null(), |n| n.as_ptr()),
                c_index(constraint.result.index())?,
                c_index(tree.len())?,
                opcode.as_mut_ptr(),
                data.as_mut_ptr(),
                parent.as_mut_ptr(),
            )
        };
        self.check("GRBaddgenconstrNL", code)?;
        let reference = ConstraintReference::at(self.num_gen_constrs);
        self.num_gen_constrs += 1;
        self.pending.set(true);
        trace!(
            nodes = tree.len(),
            result = constraint.result.index(),
            component = "solver",
            operation = "add_genconstr_nl",
            status = "success",
            "Adding general nonlinear constraint"
        );
        Ok(reference)
    }

    fn optimize(&mut self) -> Result<(), SolverError> {
        debug!(
            component = "solver",
            operation = "optimize",
            variables = self.num_vars,
            constraints = self.num_gen_constrs,
            "Starting Gurobi optimization"
        );
        self.check("GRBoptimize", unsafe { ffi::GRBoptimize(self.raw) })?;
        self.pending.set(false);
        debug!(
            component = "solver",
            operation = "optimize",
            status = "success",
            "Gurobi optimization finished"
        );
        Ok(())
    }

    fn get_int(&self, attr: IntAttr) -> Result<i32, SolverError> {
        self.flush()?;
        let name = c_string(attr.name())?;
        let mut value: c_int = 0;
        self.check("GRBgetintattr", unsafe {
            ffi::GRBgetintattr(self.raw, name.as_ptr(), &mut value)
        })?;
        Ok(value)
    }

    fn get_dbl(&self, attr: DoubleAttr) -> Result<f64, SolverError> {
        self.flush()?;
        let name = c_string(attr.name())?;
        let mut value = 0.;
        self.check("GRBgetdblattr", unsafe {
            ffi::GRBgetdblattr(self.raw, name.as_ptr(), &mut value)
        })?;
        Ok(value)
    }

    fn get_var_dbl(&self, attr: DoubleAttr, var: Variable) -> Result<f64, SolverError> {
        self.flush()?;
        let name = c_string(attr.name())?;
        let mut value = 0.;
        self.check("GRBgetdblattrelement", unsafe {
            ffi::GRBgetdblattrelement(self.raw, name.as_ptr(), c_index(var.index())?, &mut value)
        })?;
        Ok(value)
    }

    fn get_var_str(&self, attr: StringAttr, var: Variable) -> Result<String, SolverError> {
        self.flush()?;
        let name = c_string(attr.name())?;
        let mut value: *mut c_char = ptr::null_mut();
        self.check("GRBgetstrattrelement", unsafe {
            ffi::GRBgetstrattrelement(self.raw, name.as_ptr(), c_index(var.index())?, &mut value)
        })?;
        if value.is_null() {
            return Ok(String::new());
        }
        // the string belongs to the model, copy it out
        Ok(unsafe { CStr::from_ptr(value) }.to_string_lossy().into_owned())
    }

    fn name() -> &'static str {
        "Gurobi"
    }
}
